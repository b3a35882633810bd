//! Dotted permission paths with `*` wildcard templates.
//!
//! A template `build.*` grants `build.restricted` and `build.anything.else`,
//! but not `build` itself. A template without a wildcard must match the path
//! segment for segment.

/// Permission templates assigned to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    templates: Vec<String>,
}

impl Permissions {
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grant(&mut self, template: impl Into<String>) {
        let template = template.into();
        if !self.templates.contains(&template) {
            self.templates.push(template);
        }
    }

    pub fn revoke(&mut self, template: &str) {
        self.templates.retain(|t| t != template);
    }

    /// Whether any template grants `path`. The empty path is always granted.
    pub fn has(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        self.templates.iter().any(|t| matches(t, path))
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

/// Segment-wise match of one template against a dotted path.
pub fn matches(template: &str, path: &str) -> bool {
    let template: Vec<&str> = template.split('.').collect();
    let path: Vec<&str> = path.split('.').collect();

    for (i, segment) in template.iter().enumerate() {
        // A shorter path never matches, even against a wildcard.
        let Some(p) = path.get(i) else {
            return false;
        };
        if *segment == "*" {
            return true;
        }
        if p != segment {
            return false;
        }
    }
    template.len() == path.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_tail() {
        assert!(matches("*", "server.kick"));
        assert!(matches("build.*", "build.restricted"));
        assert!(matches("build.*", "build.restricted.lava"));
        assert!(!matches("build.*", "chat.color"));
        assert!(!matches("build.*", "build"));
    }

    #[test]
    fn exact_template_needs_equal_length() {
        assert!(matches("server.kick", "server.kick"));
        assert!(!matches("server.kick", "server.kick.all"));
        assert!(!matches("server.kick.all", "server.kick"));
        assert!(!matches("server.ban", "server.kick"));
    }

    #[test]
    fn empty_path_is_always_granted() {
        assert!(Permissions::default().has(""));
        assert!(!Permissions::default().has("build.restricted"));
    }

    #[test]
    fn grant_and_revoke() {
        let mut perms = Permissions::new(["chat.*"]);
        assert!(perms.has("chat.color"));
        perms.grant("build.restricted");
        perms.grant("build.restricted");
        assert_eq!(perms.templates().len(), 2);
        perms.revoke("chat.*");
        assert!(!perms.has("chat.color"));
        assert!(perms.has("build.restricted"));
    }
}
