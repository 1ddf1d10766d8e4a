//! The decoded principal placed into `RequestContext::data` by the `auth`
//! middleware (spec.md §4.4 "put decoded principal into context").

use serde_json::Value;

/// A verified caller identity. Cheap to clone; `claims` carries the full
/// decoded JWT payload for handlers that need fields this struct doesn't
/// surface directly.
#[derive(Debug, Clone)]
pub struct Principal {
    pub sub: String,
    pub roles: Vec<String>,
    pub email: Option<String>,
    pub claims: Value,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// §4.4 `auth{roles, check_all_roles}`: when `check_all` is true every
    /// entry in `required` must be present; otherwise any one match suffices.
    /// An empty `required` list always passes.
    pub fn satisfies(&self, required: &[String], check_all: bool) -> bool {
        if required.is_empty() {
            return true;
        }
        if check_all {
            required.iter().all(|r| self.has_role(r))
        } else {
            required.iter().any(|r| self.has_role(r))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            sub: "user-1".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            email: None,
            claims: Value::Null,
        }
    }

    #[test]
    fn empty_required_roles_always_satisfied() {
        assert!(principal(&[]).satisfies(&[], false));
    }

    #[test]
    fn any_mode_requires_one_match() {
        let p = principal(&["viewer"]);
        assert!(p.satisfies(&["admin".into(), "viewer".into()], false));
        assert!(!p.satisfies(&["admin".into()], false));
    }

    #[test]
    fn all_mode_requires_every_role() {
        let p = principal(&["admin", "viewer"]);
        assert!(p.satisfies(&["admin".into(), "viewer".into()], true));
        assert!(!p.satisfies(&["admin".into(), "billing".into()], true));
    }
}
