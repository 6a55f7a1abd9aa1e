// Core policy types shared by the toolguard proxy and its decision-service client

pub mod identity;
pub mod policy;
pub mod verdict;

pub use identity::PolicyIdentity;
pub use policy::{
    GuardContext, GuardPayload, GuardRequest, Message, PolicyError, PolicyEvaluator,
    PolicySelector, Role,
};
pub use verdict::Verdict;
