//! Translation hook for user-facing labels.

/// Looks up the text for a translation key.
///
/// `%s` placeholders in the result are replaced by `args`, in order.
pub trait Translate {
    fn translate(&self, key: &str, args: &[&str]) -> String;
}

/// Returns keys as-is, with placeholders filled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untranslated;

impl Translate for Untranslated {
    fn translate(&self, key: &str, args: &[&str]) -> String {
        substitute(key, args)
    }
}

/// Any `Fn(&str) -> String` works as a dictionary.
impl<F> Translate for F
where
    F: Fn(&str) -> String,
{
    fn translate(&self, key: &str, args: &[&str]) -> String {
        substitute(&self(key), args)
    }
}

/// Replace `%s` placeholders left to right. Extra placeholders stay.
pub fn substitute(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("%s") {
        let Some(arg) = args.next() else {
            break;
        };
        out.push_str(&rest[..pos]);
        out.push_str(arg);
        rest = &rest[pos + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute() {
        assert_eq!(substitute("in %s min", &["5"]), "in 5 min");
        assert_eq!(substitute("%s to %s", &["a"]), "a to %s");
        assert_eq!(substitute("plain", &["x"]), "plain");
    }

    #[test]
    fn test_closure_dictionary() {
        let german = |key: &str| match key {
            "single" => "Einfach".to_string(),
            "in %s min" => "in %s Min.".to_string(),
            other => other.to_string(),
        };
        assert_eq!(german.translate("single", &[]), "Einfach");
        assert_eq!(german.translate("in %s min", &["10"]), "in 10 Min.");
        assert_eq!(Untranslated.translate("double", &[]), "double");
    }
}
