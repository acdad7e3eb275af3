//! Shared utilities for the Paperdrop workspace.

pub mod version_info;
