//! Built-in transformers.

mod labels;
mod namespace;
mod pod_spec;
mod prefix_suffix;

pub use labels::LabelTransformer;
pub use namespace::{is_cluster_scoped, NamespaceTransformer};
pub use pod_spec::PodSpecTransformer;
pub use prefix_suffix::PrefixSuffixTransformer;

pub const PREFIX_SUFFIX_TRANSFORMER: &str = "PrefixSuffixTransformer";
pub const NAMESPACE_TRANSFORMER: &str = "NamespaceTransformer";
pub const POD_SPEC_TRANSFORMER: &str = "PodSpecTransformer";
pub const LABEL_TRANSFORMER: &str = "LabelTransformer";
