//! Capability negotiation: which upstream handlers to wire for a downstream
//! server's advertised capability set.

use crate::protocol::{methods, ServerCapabilities};
use std::collections::BTreeSet;

/// A group of operations wired together when the downstream supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandlerCategory {
    Logging,
    Prompts,
    Resources,
    ResourceSubscriptions,
    Completions,
    Tools,
}

/// How an upstream request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to the same downstream method unmodified.
    Relay,
    /// Guarded `tools/list`.
    ListTools,
    /// Guarded `tools/call`.
    CallTool,
}

impl HandlerCategory {
    /// Upstream-to-downstream requests in this category.
    pub fn requests(self) -> &'static [&'static str] {
        match self {
            Self::Logging => &[methods::LOGGING_SET_LEVEL],
            Self::Prompts => &[methods::PROMPTS_LIST, methods::PROMPTS_GET],
            Self::Resources => &[
                methods::RESOURCES_LIST,
                methods::RESOURCES_TEMPLATES_LIST,
                methods::RESOURCES_READ,
            ],
            Self::ResourceSubscriptions => {
                &[methods::RESOURCES_SUBSCRIBE, methods::RESOURCES_UNSUBSCRIBE]
            }
            Self::Completions => &[methods::COMPLETION_COMPLETE],
            Self::Tools => &[methods::TOOLS_LIST, methods::TOOLS_CALL],
        }
    }

    /// Downstream-to-upstream notifications in this category.
    pub fn notifications(self) -> &'static [&'static str] {
        match self {
            Self::Logging => &[methods::LOGGING_MESSAGE],
            Self::Prompts => &[methods::PROMPTS_LIST_CHANGED],
            Self::Resources => &[methods::RESOURCES_LIST_CHANGED],
            Self::ResourceSubscriptions => &[methods::RESOURCES_UPDATED],
            Self::Completions => &[],
            Self::Tools => &[methods::TOOLS_LIST_CHANGED],
        }
    }

    fn route(self, method: &str) -> Route {
        match (self, method) {
            (Self::Tools, methods::TOOLS_LIST) => Route::ListTools,
            (Self::Tools, _) => Route::CallTool,
            _ => Route::Relay,
        }
    }
}

/// Category predicates, evaluated once after discovery.
const CATEGORY_TABLE: &[(HandlerCategory, fn(&ServerCapabilities) -> bool)] = &[
    (HandlerCategory::Logging, |caps| caps.logging.is_some()),
    (HandlerCategory::Prompts, |caps| caps.prompts.is_some()),
    (HandlerCategory::Resources, |caps| caps.resources.is_some()),
    (HandlerCategory::ResourceSubscriptions, |caps| {
        caps.resources
            .as_ref()
            .and_then(|resources| resources.subscribe)
            .unwrap_or(false)
    }),
    (HandlerCategory::Completions, |caps| caps.completions.is_some()),
    (HandlerCategory::Tools, |caps| caps.tools.is_some()),
];

/// The registered handler categories for one proxy session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerSet {
    categories: BTreeSet<HandlerCategory>,
}

/// Decide which handler categories to register. Pure and deterministic.
pub fn negotiate(capabilities: &ServerCapabilities) -> HandlerSet {
    HandlerSet {
        categories: CATEGORY_TABLE
            .iter()
            .filter(|(_, supported)| supported(capabilities))
            .map(|(category, _)| *category)
            .collect(),
    }
}

impl HandlerSet {
    pub fn contains(&self, category: HandlerCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = HandlerCategory> + '_ {
        self.categories.iter().copied()
    }

    /// Route for an upstream request, or `None` if no handler is registered.
    pub fn route(&self, method: &str) -> Option<Route> {
        self.categories()
            .find(|category| category.requests().contains(&method))
            .map(|category| category.route(method))
    }

    /// Whether a downstream notification is relayed upstream.
    pub fn relays_notification(&self, method: &str) -> bool {
        self.categories()
            .any(|category| category.notifications().contains(&method))
    }

    /// Every upstream request method with a registered handler.
    pub fn request_methods(&self) -> Vec<&'static str> {
        self.categories()
            .flat_map(|category| category.requests().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PromptsCapability, ResourcesCapability, ToolsCapability};
    use serde_json::json;

    fn all_subsets() -> Vec<ServerCapabilities> {
        let mut sets = Vec::new();
        for mask in 0u8..64 {
            let bit = |n: u8| mask & (1 << n) != 0;
            let resources = if bit(2) {
                Some(ResourcesCapability {
                    subscribe: if bit(3) { Some(true) } else { None },
                    list_changed: None,
                })
            } else {
                None
            };
            sets.push(ServerCapabilities {
                logging: bit(0).then(|| json!({})),
                prompts: bit(1).then(PromptsCapability::default),
                resources,
                completions: bit(4).then(|| json!({})),
                tools: bit(5).then(ToolsCapability::default),
            });
        }
        sets
    }

    #[test]
    fn test_registers_exactly_what_is_advertised() {
        for caps in all_subsets() {
            let handlers = negotiate(&caps);

            assert_eq!(handlers.contains(HandlerCategory::Logging), caps.logging.is_some());
            assert_eq!(handlers.contains(HandlerCategory::Prompts), caps.prompts.is_some());
            assert_eq!(handlers.contains(HandlerCategory::Resources), caps.resources.is_some());
            assert_eq!(
                handlers.contains(HandlerCategory::ResourceSubscriptions),
                caps.resources.as_ref().and_then(|r| r.subscribe) == Some(true)
            );
            assert_eq!(
                handlers.contains(HandlerCategory::Completions),
                caps.completions.is_some()
            );
            assert_eq!(handlers.contains(HandlerCategory::Tools), caps.tools.is_some());
        }
    }

    #[test]
    fn test_negotiation_is_idempotent() {
        for caps in all_subsets() {
            assert_eq!(negotiate(&caps), negotiate(&caps));
        }
    }

    #[test]
    fn test_subscribe_without_resources_is_ignored() {
        // A subscribe flag can only arrive inside the resources capability;
        // an explicit `subscribe: false` must not register subscriptions.
        let caps = ServerCapabilities {
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(true),
            }),
            ..Default::default()
        };
        let handlers = negotiate(&caps);
        assert!(handlers.contains(HandlerCategory::Resources));
        assert!(!handlers.contains(HandlerCategory::ResourceSubscriptions));
        assert_eq!(handlers.route(methods::RESOURCES_SUBSCRIBE), None);
    }

    #[test]
    fn test_routes() {
        let caps = ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            resources: Some(ResourcesCapability::default()),
            ..Default::default()
        };
        let handlers = negotiate(&caps);

        assert_eq!(handlers.route(methods::TOOLS_LIST), Some(Route::ListTools));
        assert_eq!(handlers.route(methods::TOOLS_CALL), Some(Route::CallTool));
        assert_eq!(handlers.route(methods::RESOURCES_READ), Some(Route::Relay));
        assert_eq!(handlers.route(methods::PROMPTS_GET), None);
        assert_eq!(handlers.route("unknown/method"), None);
    }

    #[test]
    fn test_no_tool_handlers_without_tools() {
        let caps = ServerCapabilities {
            resources: Some(ResourcesCapability::default()),
            logging: Some(json!({})),
            ..Default::default()
        };
        let handlers = negotiate(&caps);

        assert_eq!(handlers.route(methods::TOOLS_LIST), None);
        assert_eq!(handlers.route(methods::TOOLS_CALL), None);
        assert!(!handlers.relays_notification(methods::TOOLS_LIST_CHANGED));
        assert!(handlers.relays_notification(methods::LOGGING_MESSAGE));
        assert_eq!(
            handlers.request_methods(),
            vec![
                methods::LOGGING_SET_LEVEL,
                methods::RESOURCES_LIST,
                methods::RESOURCES_TEMPLATES_LIST,
                methods::RESOURCES_READ,
            ]
        );
    }
}
