pub const CODER_SYSTEM_MD: &str = include_str!("../prompts/coder_system.md");
pub const GENERATE_MD: &str = include_str!("../prompts/generate.md");
pub const REVISE_MD: &str = include_str!("../prompts/revise.md");
pub const REPAIR_MD: &str = include_str!("../prompts/repair.md");
pub const CRITIC_SYSTEM_MD: &str = include_str!("../prompts/critic_system.md");
pub const QUESTIONS_MD: &str = include_str!("../prompts/questions.md");
pub const INSPECT_MD: &str = include_str!("../prompts/inspect.md");

/// Replace every `{{name}}` placeholder with its value.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{{{name}}}}}"), value)
    })
}

/// Bullet list used for issues and suggestions.
pub fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
