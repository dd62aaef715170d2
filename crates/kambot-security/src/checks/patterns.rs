//! Pattern catalogs for input screening.

use super::{ScreenCategory, ScreenCheck};
use regex::Regex;

fn check(id: &'static str, name: &'static str, category: ScreenCategory, pattern: &str) -> ScreenCheck {
    ScreenCheck {
        id,
        name,
        category,
        // Catalog patterns are literals covered by the unit tests.
        pattern: Regex::new(pattern).expect("invalid built-in screening pattern"),
    }
}

/// Injection and traversal markers rejected at validation.
pub fn injection_checks() -> Vec<ScreenCheck> {
    let mut checks = prompt_injection_checks();
    checks.extend(code_injection_checks());
    checks.extend(traversal_checks());
    checks.extend(sql_injection_checks());
    checks
}

/// Harmful-intent patterns used by the offline moderation service.
pub fn harmful_intent_checks() -> Vec<ScreenCheck> {
    vec![
        check(
            "HI-001", "Self-harm intent",
            ScreenCategory::SelfHarm,
            r"(?i)\b(kill|hurt|harm)\s+myself\b|\bsuicid(e|al)\b|\bend\s+my\s+life\b",
        ),
        check(
            "HI-002", "Poisoning another person",
            ScreenCategory::HarmToOthers,
            r"(?i)\b(poison|drug|sedate)\s+(my|a|an|the|someone|somebody|him|her|them)\b",
        ),
        check(
            "HI-003", "Administering without consent",
            ScreenCategory::HarmToOthers,
            r"(?i)without\s+(him|her|them|someone|anyone)\s+knowing",
        ),
        check(
            "HI-004", "Weaponizing secretions",
            ScreenCategory::Weapons,
            r"(?i)\b(weaponi[sz]e|use\s+as\s+a\s+weapon|make\s+a\s+toxin)\b",
        ),
    ]
}

// ---- Prompt injection ----

fn prompt_injection_checks() -> Vec<ScreenCheck> {
    vec![
        check(
            "PI-001", "Ignore instructions override",
            ScreenCategory::PromptInjection,
            r"(?i)\b(ignore|forget|disregard)\b.{0,40}\b(previous|prior|above|earlier)\b.{0,20}\b(instructions?|prompts?|rules|messages?)\b",
        ),
        check(
            "PI-002", "Ignore everything above",
            ScreenCategory::PromptInjection,
            r"(?i)\b(ignore|disregard)\s+(all|everything)\s+(of\s+)?(the\s+)?above\b",
        ),
        check(
            "PI-003", "System prompt extraction",
            ScreenCategory::PromptInjection,
            r"(?i)\bsystem\s*prompt\b",
        ),
        check(
            "PI-004", "Special model tokens",
            ScreenCategory::PromptInjection,
            r"(?i)<\|?(system|im_start|im_end|im_sep|endoftext)\|?>|\[/?INST\]|<</?SYS>>",
        ),
        check(
            "PI-005", "Role reassignment",
            ScreenCategory::PromptInjection,
            r"(?i)\b(you\s+are\s+now|pretend\s+to\s+be|your\s+new\s+role\s+is)\b",
        ),
        check(
            "PI-006", "Jailbreak request",
            ScreenCategory::PromptInjection,
            r"(?i)\b(jailbreak|do\s+anything\s+now|DAN\s+mode|developer\s+mode)\b|\bbypass\s+(your\s+)?(safety|filters?|guard(rails?)?)\b",
        ),
    ]
}

// ---- Code injection ----

fn code_injection_checks() -> Vec<ScreenCheck> {
    vec![
        check("CI-001", "Script tag", ScreenCategory::CodeInjection, r"(?i)<\s*script\b"),
        check("CI-002", "javascript: URL", ScreenCategory::CodeInjection, r"(?i)javascript\s*:"),
        check(
            "CI-003", "Inline event handler",
            ScreenCategory::CodeInjection,
            r"(?i)\bon(load|error|click|mouseover|focus)\s*=",
        ),
        check("CI-004", "eval/exec call", ScreenCategory::CodeInjection, r"(?i)\b(eval|exec)\s*\("),
        check(
            "CI-005", "Python module import",
            ScreenCategory::CodeInjection,
            r"(?i)\bimport\s+(os|subprocess|sys)\b|__import__",
        ),
        check(
            "CI-006", "Shell command substitution",
            ScreenCategory::CodeInjection,
            r"\$\([^)]*\)|`[^`]+`",
        ),
    ]
}

// ---- Path traversal ----

fn traversal_checks() -> Vec<ScreenCheck> {
    vec![check(
        "PT-001", "Relative path traversal",
        ScreenCategory::PathTraversal,
        r"\.\./|\.\.\\",
    )]
}

// ---- SQL injection ----

fn sql_injection_checks() -> Vec<ScreenCheck> {
    vec![
        check(
            "SQ-001", "UNION SELECT",
            ScreenCategory::SqlInjection,
            r"(?i)\bunion\s+(all\s+)?select\b",
        ),
        check(
            "SQ-002", "Destructive DDL",
            ScreenCategory::SqlInjection,
            r"(?i)\b(drop|truncate|alter)\s+(table|database|schema)\b",
        ),
        check(
            "SQ-003", "Statement terminator with comment",
            ScreenCategory::SqlInjection,
            r";\s*--",
        ),
        check(
            "SQ-004", "Tautology",
            ScreenCategory::SqlInjection,
            r#"(?i)['"]\s*or\s+['"]?1['"]?\s*=\s*['"]?1"#,
        ),
    ]
}
