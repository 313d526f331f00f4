//! Config subcommand handlers.

use std::io::BufRead;

use serde::Serialize;

use appstax_config::Profile;
use appstax_core::DEFAULT_BASE_URL;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

/// `config show` view: the resolved file plus where it lives. Secrets
/// are masked.
#[derive(Serialize)]
struct ShowView<'a> {
    path: String,
    default_profile: Option<&'a str>,
    profiles: Vec<ProfileView<'a>>,
}

#[derive(Serialize)]
struct ProfileView<'a> {
    name: &'a str,
    base_url: &'a str,
    app_key: &'static str,
    app_key_env: Option<&'a str>,
    realtime: Option<bool>,
    insecure: Option<bool>,
}

fn key_source(profile: &Profile) -> &'static str {
    match (&profile.app_key_env, &profile.app_key) {
        (Some(_), _) => "env",
        (None, Some(_)) => "plaintext (hidden)",
        (None, None) => "keyring",
    }
}

fn available_profiles(cfg: &appstax_config::Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init {
            url,
            key_env,
            key,
            keyring,
        } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let base_url = url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
            if url::Url::parse(&base_url).is_err() {
                return Err(CliError::Validation {
                    field: "url".into(),
                    reason: format!("invalid URL: {base_url}"),
                });
            }

            let app_key = match key {
                Some(key) if keyring => {
                    appstax_config::store_app_key(&profile_name, &key)?;
                    eprintln!("✓ App key stored in system keyring");
                    None
                }
                other => other,
            };

            cfg.profiles.insert(
                profile_name.clone(),
                Profile {
                    base_url,
                    app_key,
                    app_key_env: key_env,
                    ..Profile::default()
                },
            );
            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }

            config::save_config(&cfg)?;
            eprintln!(
                "✓ Profile '{profile_name}' written to {}",
                config::config_path().display()
            );
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let view = ShowView {
                path: config::config_path().display().to_string(),
                default_profile: cfg.default_profile.as_deref(),
                profiles: cfg
                    .profiles
                    .iter()
                    .map(|(name, p)| ProfileView {
                        name,
                        base_url: &p.base_url,
                        app_key: key_source(p),
                        app_key_env: p.app_key_env.as_deref(),
                        realtime: p.realtime,
                        insecure: p.insecure,
                    })
                    .collect(),
            };

            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&view)?,
                OutputFormat::JsonCompact => serde_json::to_string(&view)?,
                OutputFormat::Table | OutputFormat::Yaml | OutputFormat::Plain => {
                    serde_yaml::to_string(&view)?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: appstax config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetKey ──────────────────────────────────────────────────
        ConfigCommand::SetKey { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available_profiles(&cfg),
                });
            }

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let key = line.trim();
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "app key".into(),
                    reason: "value cannot be empty".into(),
                });
            }

            appstax_config::store_app_key(&profile_name, key)?;
            eprintln!("✓ App key stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
