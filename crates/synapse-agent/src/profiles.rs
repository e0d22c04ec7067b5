//! Sub-agent type profiles
//!
//! A profile fixes a sub-agent's system prompt and tool permissions. The
//! recursion guard is policy, not mechanism: every built-in profile
//! excludes `task:` so nesting stops at one level unless a host
//! deliberately configures otherwise.

use std::collections::HashMap;

use synapse_core::PermissionSet;

#[derive(Clone, Debug)]
pub struct SubAgentProfile {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub permissions: PermissionSet,
}

pub struct ProfileSet {
    profiles: HashMap<String, SubAgentProfile>,
}

impl ProfileSet {
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// The built-in profile table.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.insert(SubAgentProfile {
            name: "explore".to_string(),
            description: "Read-only codebase exploration".to_string(),
            system_prompt: "You are a focused exploration agent. Read and search the \
                workspace to answer the task, then report findings concisely. Do not \
                modify anything."
                .to_string(),
            permissions: PermissionSet::all().with_exclude(&["write", "edit", "task:"]),
        });
        set.insert(SubAgentProfile {
            name: "general".to_string(),
            description: "General-purpose worker with the full tool surface".to_string(),
            system_prompt: "You are a focused worker agent. Use the tools to complete \
                the task precisely, then report what you did and what changed."
                .to_string(),
            permissions: PermissionSet::all().with_exclude(&["task:"]),
        });
        set.insert(SubAgentProfile {
            name: "plan".to_string(),
            description: "Pure-reasoning planner, no tools".to_string(),
            system_prompt: "You are a planning agent. Reason over the task description \
                alone and produce a concrete, ordered plan. You have no tools."
                .to_string(),
            permissions: PermissionSet::none(),
        });
        set
    }

    pub fn insert(&mut self, profile: SubAgentProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<SubAgentProfile> {
        self.profiles.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_exist() {
        let set = ProfileSet::builtin();
        assert!(set.get("explore").is_some());
        assert!(set.get("general").is_some());
        assert!(set.get("plan").is_some());
        assert!(set.get("nonexistent").is_none());
    }

    #[test]
    fn test_every_builtin_profile_guards_recursion() {
        let set = ProfileSet::builtin();
        for name in ["explore", "general"] {
            let profile = set.get(name).unwrap();
            assert!(
                profile.permissions.excludes("task:explore"),
                "{name} must exclude nested tasks"
            );
        }
    }

    #[test]
    fn test_explore_is_read_only() {
        let profile = ProfileSet::builtin().get("explore").unwrap();
        assert!(profile.permissions.excludes("write"));
        assert!(profile.permissions.excludes("edit"));
        assert!(!profile.permissions.excludes("read"));
    }

    #[test]
    fn test_plan_is_pure_reasoning() {
        let profile = ProfileSet::builtin().get("plan").unwrap();
        assert!(profile.permissions.is_empty_include());
    }
}
