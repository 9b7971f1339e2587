use crate::cli::ConfigCommands;
use crate::config_profiles::{mask_secret, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_key,
            project_id,
            auth_emulator_host,
            firestore_emulator_host,
            poll_interval_ms,
            no_activate,
        } => {
            let updates = CliProfile {
                firebase_api_key: normalize_text_option(api_key),
                firebase_project_id: normalize_text_option(project_id),
                auth_emulator_host: normalize_text_option(auth_emulator_host),
                firestore_emulator_host: normalize_text_option(firestore_emulator_host),
                poll_interval_ms,
            };
            run_config_init(profile.as_deref().or(global_profile), updates, no_activate)
        }
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    updates: CliProfile,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    merge_profile(profile, updates);
    profile
        .firebase_config(|_| None)
        .map_err(|error| CliError::Config(error.to_string()))?;
    let missing_fields = profile.missing_fields();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );
    if missing_fields.is_empty() {
        println!("Profile '{profile_name}' is ready. Run `scribble` to sign in.");
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };
    for line in describe_profile(&profile_name, profile) {
        println!("{line}");
    }
    Ok(())
}

/// Overlay explicitly given values on a stored profile.
pub fn merge_profile(profile: &mut CliProfile, updates: CliProfile) {
    if let Some(value) = updates.firebase_api_key {
        profile.firebase_api_key = Some(value);
    }
    if let Some(value) = updates.firebase_project_id {
        profile.firebase_project_id = Some(value);
    }
    if let Some(value) = updates.auth_emulator_host {
        profile.auth_emulator_host = Some(value);
    }
    if let Some(value) = updates.firestore_emulator_host {
        profile.firestore_emulator_host = Some(value);
    }
    if let Some(value) = updates.poll_interval_ms {
        profile.poll_interval_ms = Some(value);
    }
}

pub fn describe_profile(profile_name: &str, profile: &CliProfile) -> Vec<String> {
    let unset = || "(not set)".to_string();
    vec![
        format!("profile:                 {profile_name}"),
        format!(
            "api_key:                 {}",
            profile.firebase_api_key.as_deref().map_or_else(unset, mask_secret)
        ),
        format!(
            "project_id:              {}",
            profile.firebase_project_id.clone().unwrap_or_else(unset)
        ),
        format!(
            "auth_emulator_host:      {}",
            profile.auth_emulator_host.clone().unwrap_or_else(unset)
        ),
        format!(
            "firestore_emulator_host: {}",
            profile.firestore_emulator_host.clone().unwrap_or_else(unset)
        ),
        format!(
            "poll_interval_ms:        {}",
            profile
                .poll_interval_ms
                .map_or_else(unset, |value| value.to_string())
        ),
    ]
}
