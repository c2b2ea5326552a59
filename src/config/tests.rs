#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_from_env() {
        env::set_var("SMTP_ENGINE_WEBHOOK_URL", "https://webhook.example.com/endpoint");
        env::set_var("SMTP_ENGINE_BIND_ADDRESS", "127.0.0.1");
        env::set_var("SMTP_ENGINE_PORT", "2525");
        env::set_var("SMTP_ENGINE_AUTH_MECHANISMS", "plain, login");

        let config = Config::from_env().expect("Failed to load config from environment in test");

        assert_eq!(config.webhook_url, "https://webhook.example.com/endpoint");
        assert_eq!(config.smtp_bind_address, "127.0.0.1");
        assert_eq!(config.smtp_port, 2525);
        assert_eq!(
            config.supported_auth_mechanisms,
            vec!["PLAIN".to_string(), "LOGIN".to_string()]
        );

        env::remove_var("SMTP_ENGINE_WEBHOOK_URL");
        env::remove_var("SMTP_ENGINE_BIND_ADDRESS");
        env::remove_var("SMTP_ENGINE_PORT");
        env::remove_var("SMTP_ENGINE_AUTH_MECHANISMS");
    }

    #[test]
    fn test_config_default_values() {
        env::set_var("SMTP_ENGINE_WEBHOOK_URL", "https://webhook.example.com/endpoint");
        env::remove_var("SMTP_ENGINE_BIND_ADDRESS");
        env::remove_var("SMTP_ENGINE_PORT");
        env::remove_var("SMTP_ENGINE_AUTH_MECHANISMS");

        let config = Config::from_env().expect("Failed to load config from environment in test");

        assert_eq!(config.hostname, "smtp-engine");
        assert_eq!(config.smtp_bind_address, "0.0.0.0");
        assert_eq!(config.smtp_port, 2525);
        assert_eq!(config.max_line_length, 1000);
        assert_eq!(config.max_receivers, 100);
        assert!(config.supported_auth_mechanisms.is_empty());

        env::remove_var("SMTP_ENGINE_WEBHOOK_URL");
    }

    #[test]
    fn test_config_missing_required_vars() {
        env::remove_var("SMTP_ENGINE_WEBHOOK_URL");

        let result = Config::from_env();

        assert!(result.is_err());
    }
}
