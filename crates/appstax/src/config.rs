//! CLI-side configuration: profile selection and flag overrides layered on
//! top of `appstax-config`.

use std::time::Duration;

use secrecy::SecretString;

use appstax_config::{Config, Profile};
use appstax_core::{ClientConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use appstax_config::{config_path, load_config_or_default, save_config};

/// Profile named by `--profile`, else the config's default.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut client = match (cfg.profiles.get(&profile_name), &global.app_key) {
        (Some(profile), Some(key)) => appstax_config::client_config_with_key(
            profile,
            &cfg.defaults,
            SecretString::from(key.clone()),
        )?,
        (Some(profile), None) => {
            appstax_config::profile_to_client_config(profile, &profile_name, &cfg.defaults)?
        }
        // No profile -- the key has to come from the flag / env var
        (None, Some(key)) => appstax_config::client_config_with_key(
            &Profile {
                base_url: appstax_core::DEFAULT_BASE_URL.into(),
                ..Profile::default()
            },
            &cfg.defaults,
            SecretString::from(key.clone()),
        )?,
        (None, None) => {
            return Err(CliError::NoAppKey {
                profile: profile_name,
            });
        }
    };

    apply_overrides(&mut client, global)?;
    Ok(client)
}

fn apply_overrides(client: &mut ClientConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref raw) = global.base_url {
        client.base_url = raw.parse().map_err(|_| CliError::Validation {
            field: "base-url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    if let Some(ref session) = global.session {
        client.session_id = Some(SecretString::from(session.clone()));
    }
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        client.timeout = Duration::from_secs(secs);
    }
    Ok(())
}
