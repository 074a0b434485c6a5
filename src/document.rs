/// The stylesheet embedded in every assembled document.
pub const STYLESHEET: &str = include_str!("stylesheet.css");

/// Wrap an HTML fragment in a complete document carrying [`STYLESHEET`].
pub fn assemble(fragment: &str) -> String {
    let mut html = String::with_capacity(STYLESHEET.len() + fragment.len() + 128);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n<style>\n");
    html.push_str(STYLESHEET);
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(fragment);
    html.push_str("\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_fragment() {
        let html = assemble("<p>Hi</p>\n");
        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />"));
        assert!(html.contains("<body>\n<p>Hi</p>\n\n</body>"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn stylesheet_is_embedded_unchanged() {
        let html = assemble("");
        assert!(html.contains(&format!("<style>\n{STYLESHEET}</style>")));
        assert!(STYLESHEET.contains("@page {\n  size: A4;\n  margin: 2cm;\n}"));
        assert!(STYLESHEET.contains("tr:nth-child(even)"));
    }

    #[test]
    fn identical_for_every_invocation() {
        assert_eq!(assemble("<p>x</p>"), assemble("<p>x</p>"));
    }
}
