//! Resource names and variant normalization

/// A name from the container's name table
///
/// Names carry variant markers: a `$...` suffix of key/value options and a
/// `#...` suffix selecting a variant. The normalized form drops both but
/// keeps a leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    /// Name exactly as stored
    pub full: String,
    /// Name with variant markers stripped
    pub normalized: String,
}

impl ResourceName {
    /// Build from a stored name
    pub fn new(full: impl Into<String>) -> Self {
        let full = full.into();
        let normalized = normalize(&full);
        Self { full, normalized }
    }

    /// Whether `target` names this resource, exactly or by normalized form
    pub fn matches(&self, target: &str) -> bool {
        self.full.eq_ignore_ascii_case(target) || self.normalized.eq_ignore_ascii_case(target)
    }
}

/// Strip variant markers from a resource name
///
/// ```
/// use resforge_patcher::container::normalize;
///
/// assert_eq!(normalize("art/ui/x.tga$mtlkind=ui"), "art/ui/x.tga");
/// assert_eq!(normalize("#str_title#variant"), "#str_title");
/// ```
pub fn normalize(name: &str) -> String {
    let (prefix, body) = name
        .strip_prefix('#')
        .map_or(("", name), |rest| ("#", rest));

    let body = body.split_once('$').map_or(body, |(head, _)| head);
    let body = body.rsplit_once('#').map_or(body, |(head, _)| head);

    format!("{prefix}{body}")
}

/// Whether a name refers to a texture payload
pub fn is_texture(name: &str) -> bool {
    let normalized = normalize(name).to_ascii_lowercase();
    normalized.ends_with(".tga") || normalized.ends_with(".png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("models/a.lwo"), "models/a.lwo");
        assert_eq!(normalize("a.tga$streamed$mtlkind=ui"), "a.tga");
        assert_eq!(normalize("a.lwo#var1"), "a.lwo");
        assert_eq!(normalize("a#b#c"), "a#b");
        assert_eq!(normalize("#hud"), "#hud");
        assert_eq!(normalize("#hud#alt$opt"), "#hud");
        assert_eq!(normalize("x$y#z"), "x");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_matches_either_form() {
        let name = ResourceName::new("art/logo.tga$mtlkind=ui");
        assert!(name.matches("art/logo.tga$mtlkind=ui"));
        assert!(name.matches("ART/LOGO.TGA"));
        assert!(!name.matches("art/logo"));
    }

    #[test]
    fn test_is_texture() {
        assert!(is_texture("art/a.tga"));
        assert!(is_texture("art/a.PNG$mtlkind=ui"));
        assert!(!is_texture("models/a.lwo"));
    }
}
