//! Model persistence.
//!
//! Trees serialize to JSON through any `Write`/`Read` pair. Round-tripping
//! preserves structure, packed split indices, per-node statistics, and leaf
//! values exactly.

use std::io::{Read, Write};

use crate::repr::RegTree;

/// Errors that can occur when saving or loading a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Write a tree to a stream.
pub fn save_tree<W: Write>(tree: &RegTree, writer: W) -> Result<(), ModelIoError> {
    serde_json::to_writer(writer, tree)?;
    Ok(())
}

/// Read a tree from a stream.
pub fn load_tree<R: Read>(reader: R) -> Result<RegTree, ModelIoError> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_tree() {
        let mut tree = RegTree::new(1);
        tree.set_split(0, 3, 0.75, true);
        let (left, right) = tree.add_children(0);
        tree.set_leaf(left, -0.5);
        tree.set_leaf(right, 0.5);
        tree.stat_mut(0).loss_chg = 1.25;

        let mut buf = Vec::new();
        save_tree(&tree, &mut buf).unwrap();
        let loaded = load_tree(buf.as_slice()).unwrap();

        assert_eq!(loaded, tree);
        assert_eq!(loaded.node(0).split_index(), 3);
        assert!(loaded.node(0).default_left());
        assert_eq!(loaded.stat(0).loss_chg, 1.25);
    }

    #[test]
    fn load_rejects_garbage() {
        let err = load_tree(&b"not a model"[..]);
        assert!(matches!(err, Err(ModelIoError::Codec(_))));
    }
}
