/// Expand `${ENV_VAR}` placeholders in raw config text.
///
/// Unknown variables and unterminated placeholders are kept verbatim.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "TOKEN" => Some("abc.def".into()),
            "GUILD_ID" => Some("42".into()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${TOKEN}\"", "token = \"abc.def\"")]
    #[case("${TOKEN}:${GUILD_ID}", "abc.def:42")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("${}", "${}")]
    #[case("cost = $5", "cost = $5")]
    #[case("open ${TOKEN", "open ${TOKEN")]
    #[case("plain text", "plain text")]
    fn expands_placeholders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_with(input, lookup), expected);
    }
}
