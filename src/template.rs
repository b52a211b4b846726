//! `${name}` placeholder substitution used to name and label generated descriptors.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder ${{{0}}} in template {1:?}")]
    UnknownPlaceholder(String, String),
    #[error("unterminated placeholder in template {0:?}")]
    Unterminated(String),
}

/// Replace every `${key}` in `template` with the matching value. `$$` is a literal `$`.
/// Keys not referenced by the template are ignored; unknown placeholders are errors.
pub fn substitute(template: &str, values: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }
        let Some(body) = after.strip_prefix('{') else {
            out.push('$');
            rest = after;
            continue;
        };
        let end = body
            .find('}')
            .ok_or_else(|| TemplateError::Unterminated(template.to_string()))?;
        let key = &body[..end];
        let value = values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(key.to_string(), template.to_string()))?;
        out.push_str(value);
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders() {
        let s = substitute(
            "${fmsg}_${fname}${findex}",
            &[("fmsg", "ATTITUDE"), ("fname", "roll"), ("findex", "")],
        )
        .unwrap();
        assert_eq!(s, "ATTITUDE_roll");
    }

    #[test]
    fn dollar_escape_and_plain_dollar() {
        assert_eq!(substitute("$$x $y", &[]).unwrap(), "$x $y");
    }

    #[test]
    fn unknown_placeholder_is_error() {
        assert!(matches!(
            substitute("${missing}", &[("other", "1")]),
            Err(TemplateError::UnknownPlaceholder(..))
        ));
        assert!(matches!(substitute("${open", &[]), Err(TemplateError::Unterminated(_))));
    }
}
