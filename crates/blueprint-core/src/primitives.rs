//! # Language Primitives
//!
//! Fixed names and limits of the blueprint language.
//!
//! These are compiled into the binary and are immutable at runtime.
//! Error codes live here too: tooling branches on them, so a code never
//! changes meaning once published.

// =============================================================================
// SYMBOLIC NODE REFERENCES
// =============================================================================

/// Reference to the node instance owning the operation being evaluated.
pub const SELF: &str = "SELF";

/// Reference to the source side of a relationship operation.
pub const SOURCE: &str = "SOURCE";

/// Reference to the target side of a relationship operation.
pub const TARGET: &str = "TARGET";

// =============================================================================
// INTRINSIC FUNCTION NAMES
// =============================================================================

pub const GET_ATTRIBUTE: &str = "get_attribute";
pub const GET_PROPERTY: &str = "get_property";
pub const CONCAT: &str = "concat";

/// Every intrinsic function name the language knows about, including the
/// ones resolved outside this crate (inputs, secrets, capabilities).
///
/// The schema merge engine skips type validation for values shaped like a
/// call to any of these, since they only get a concrete value later.
pub const INTRINSIC_FUNCTIONS: &[&str] = &[
    GET_ATTRIBUTE,
    GET_PROPERTY,
    CONCAT,
    "get_input",
    "get_secret",
    "get_capability",
];

// =============================================================================
// SCALING POLICIES
// =============================================================================

/// The only policy type accepted under the top-level `policies` section.
pub const SCALING_POLICY_TYPE: &str = "cloudify.policies.scaling";

/// `max_instances` value meaning "no upper bound".
pub const UNBOUNDED_INSTANCES: i64 = -1;

pub const DEFAULT_INSTANCES: i64 = 1;
pub const DEFAULT_MIN_INSTANCES: i64 = 0;

// =============================================================================
// EVALUATION LIMITS
// =============================================================================

/// Maximum nesting depth the function evaluator walks into.
///
/// Payloads deeper than this are rejected instead of overflowing the stack.
pub const MAX_EVALUATION_DEPTH: usize = 128;

/// Maximum `derived_from` chain length for data types.
pub const MAX_DERIVATION_DEPTH: usize = 64;

// =============================================================================
// ERROR CODES
// =============================================================================

pub const ERROR_UNKNOWN_TYPE: u32 = 14;
pub const ERROR_VERSION_MISMATCH: u32 = 29;
pub const ERROR_GROUP_MEMBER: u32 = 40;
pub const ERROR_NON_EXISTENT_POLICY_TYPE: u32 = 41;
pub const ERROR_NON_EXISTENT_TRIGGER_TYPE: u32 = 42;
pub const ERROR_NON_EXISTENT_SCALING_TARGET: u32 = 43;
pub const ERROR_DUPLICATE_SCALING_TARGET: u32 = 46;
pub const ERROR_PROPERTY_TYPE: u32 = 50;
pub const ERROR_INVALID_INSTANCES: u32 = 105;
pub const ERROR_UNDEFINED_PROPERTY: u32 = 106;
pub const ERROR_MISSING_PROPERTY: u32 = 107;
