// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Rendered in place of any profile field the form left empty.
pub const PLACEHOLDER: &str = "未入力";

/// Closing instruction for every prompt whose reply goes through the response parser.
pub const JSON_ONLY_INSTRUCTION: &str = "\
【出力ルール】
- 上記スキーマのJSONオブジェクトのみを出力すること。前置き・説明文・コードフェンス(```)は禁止。
- 文字列は必ずダブルクォート(\")で囲むこと。
- 数値は単位を付けず数字のみで記述すること。";

/// Highest-priority marker used when the customer stated a request today.
pub const CUSTOMER_REQUEST_PRIORITY: &str =
    "★本日の要望が記載されています。最優先で考慮し、すべての提案をこの要望に合わせてください。";

/// Used when no customer request was recorded.
pub const PROFESSIONAL_JUDGMENT: &str =
    "本日の要望は特にありません。髪の状態と所見をもとに、プロとしての判断で最適な提案をしてください。";

/// Fills `{name}` placeholders in a single left-to-right pass.
///
/// Substituted values are copied verbatim and never re-scanned, so knowledge
/// documents or customer text that happen to contain `{...}` survive intact.
/// Unknown placeholders are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_end = after.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
        match name_end {
            Some(end) if end > 0 && after[end..].starts_with('}') => {
                let name = &after[..end];
                match vars.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Blank or absent values render as [`PLACEHOLDER`].
pub fn or_placeholder(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => PLACEHOLDER,
    }
}

/// Picks the priority line for a customer's free-form request.
pub fn request_directive(request: Option<&str>) -> String {
    match request.map(str::trim) {
        Some(r) if !r.is_empty() => format!("{CUSTOMER_REQUEST_PRIORITY}\n本日の要望: {r}"),
        _ => PROFESSIONAL_JUDGMENT.to_string(),
    }
}
