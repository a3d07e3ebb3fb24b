//! # Draft/Patch Producer
//!
//! Turns a mutation callback into a [`Transaction`].
//!
//! Each participating container's value is deep-cloned into a mutable
//! draft, the callback runs once against all drafts, and each draft is
//! diffed against its original to produce forward and reverse patches.
//!
//! The callback never touches a container directly, so if it fails (or
//! panics) nothing has changed and no transaction exists.

use crate::container::ContainerRegistry;
use crate::transaction::{ContainerChange, Transaction};
use crate::EditorError;
use atelier_common::diff;
use serde_json::Value;
use std::collections::HashSet;

/// Result of running a mutation against drafts
#[derive(Debug)]
pub(crate) struct Drafted {
    /// `None` when the mutation changed nothing
    pub transaction: Option<Transaction>,

    /// Final draft values, in the order the namespaces were listed
    pub values: Vec<Value>,
}

/// Run `mutate` against drafts of `namespaces` and collect the patches.
///
/// Namespaces are validated before `mutate` runs: unknown namespaces fail
/// with [`EditorError::UnregisteredContainer`], repeated ones with
/// [`EditorError::DuplicateContainer`].
pub(crate) fn produce<F, E>(
    containers: &ContainerRegistry,
    namespaces: &[&str],
    mutate: F,
) -> Result<Drafted, E>
where
    F: FnOnce(&mut [Value]) -> Result<(), E>,
    E: From<EditorError>,
{
    let mut seen = HashSet::new();
    let mut originals = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        if !seen.insert(*namespace) {
            return Err(EditorError::DuplicateContainer(namespace.to_string()).into());
        }
        originals.push(containers.require(namespace)?.value());
    }

    let mut drafts: Vec<Value> = originals.iter().map(|value| (*value).clone()).collect();
    mutate(&mut drafts)?;

    let changes: Vec<ContainerChange> = namespaces
        .iter()
        .zip(originals.iter().zip(drafts.iter()))
        .filter_map(|(namespace, (original, draft))| {
            let patches = diff(original, draft);
            if patches.is_empty() {
                return None;
            }
            Some(ContainerChange {
                namespace: namespace.to_string(),
                forward: patches.forward,
                reverse: patches.reverse,
            })
        })
        .collect();

    let transaction = if changes.is_empty() {
        None
    } else {
        Some(Transaction::new(changes))
    };

    Ok(Drafted {
        transaction,
        values: drafts,
    })
}
