use color_eyre::Result;
use dialoguer::{Confirm, Input, Password};

/// Prompt for a non-empty value, offering `default` when given
pub fn prompt_string(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|value: &String| -> std::result::Result<(), &str> {
            if value.trim().is_empty() {
                Err("A value is required")
            } else {
                Ok(())
            }
        });

    if let Some(default_value) = default {
        input = input.default(default_value.to_string());
    }

    let value = input
        .interact_text()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to read input: {}", e))?;
    Ok(value.trim().to_string())
}

/// Prompt for a secret (masked input)
pub fn prompt_secret(prompt: &str) -> Result<String> {
    let value = Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to read secret: {}", e))?;
    Ok(value.trim().to_string())
}

pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to read confirmation: {}", e))
}
