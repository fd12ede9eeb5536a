//! Profile precedence.

/// Name of the implicit base profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Ordered list of profiles; later entries override earlier ones.
///
/// The default profile is always first, active profiles follow in the order
/// given, and no profile appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    profiles: Vec<String>,
}

impl MergePlan {
    /// Build a plan from the active profile names.
    pub fn new<I, S>(active: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profiles = vec![DEFAULT_PROFILE.to_string()];
        for name in active {
            let name = name.as_ref().trim();
            if name.is_empty() || profiles.iter().any(|p| p == name) {
                continue;
            }
            profiles.push(name.to_string());
        }
        Self { profiles }
    }

    /// Parse a comma separated profile list, e.g. `"dev,local"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// All profiles in precedence order, default first.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Active profiles, without the implicit default.
    pub fn active(&self) -> &[String] {
        &self.profiles[1..]
    }

    pub fn position(&self, profile: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p == profile)
    }
}

impl Default for MergePlan {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_first_and_dedup() {
        let plan = MergePlan::new(["prod", "default", "eu", "prod"]);
        assert_eq!(plan.profiles(), ["default", "prod", "eu"]);
        assert_eq!(plan.active(), ["prod", "eu"]);
        assert_eq!(plan.position("eu"), Some(2));
        assert_eq!(plan.position("dev"), None);
    }

    #[test]
    fn test_parse_list() {
        let plan = MergePlan::parse(" dev, ,local ");
        assert_eq!(plan.profiles(), ["default", "dev", "local"]);
        assert_eq!(MergePlan::parse("").profiles(), ["default"]);
    }
}
