mod common;

use common::{CountingRegistry, directories_under};
use proptest::prelude::*;
use rtsync::channel::mask;
use rtsync::decoder::encode_record;
use rtsync::{EventDecoder, WatchHandle, WatchTree};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn record_strategy() -> impl Strategy<Value = (i32, u32, u32, Option<String>)> {
    let bits = prop::sample::select(vec![
        mask::CREATE,
        mask::CREATE | mask::ISDIR,
        mask::DELETE,
        mask::DELETE | mask::ISDIR,
        mask::MODIFY,
        mask::MOVED_FROM | mask::ISDIR,
        mask::MOVED_TO,
        mask::IGNORED,
    ]);
    (
        1i32..500,
        bits,
        any::<u32>(),
        prop::option::of("[a-zA-Z0-9._-]{1,64}"),
    )
}

/// Relative directory paths up to three levels deep over a tiny alphabet, so
/// siblings and shared prefixes (`a` vs `ab`) are common.
fn tree_strategy() -> impl Strategy<Value = Vec<PathBuf>> {
    prop::collection::vec(
        prop::collection::vec("a|ab|b|c", 1..=3)
            .prop_map(|parts| parts.iter().collect::<PathBuf>()),
        0..20,
    )
}

proptest! {
    #[test]
    fn test_split_reads_decode_like_one_read(
        records in prop::collection::vec(record_strategy(), 1..30),
        chunks in prop::collection::vec(1usize..200, 1..50),
    ) {
        // Invariant: the event sequence does not depend on read boundaries
        let stream: Vec<u8> = records
            .iter()
            .flat_map(|(wd, bits, cookie, name)| {
                encode_record(WatchHandle::from_raw(*wd), *bits, *cookie, name.as_deref())
            })
            .collect();

        let whole = EventDecoder::new(4096).feed(&stream);

        let mut split_decoder = EventDecoder::new(4096);
        let mut split = Vec::new();
        let mut rest = stream.as_slice();
        for size in chunks.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let n = (*size).min(rest.len());
            split.extend(split_decoder.feed(&rest[..n]));
            rest = &rest[n..];
        }

        prop_assert_eq!(whole.len(), records.len());
        prop_assert_eq!(&split, &whole);
        prop_assert_eq!(split_decoder.carried(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_registration_tracks_every_directory(dirs in tree_strategy()) {
        // Invariant: one entry per directory at or below the root
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for dir in &dirs {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("file.txt"), b"x").unwrap();

        let mut registry = CountingRegistry::new();
        let mut tree = WatchTree::new();
        let added = tree.register_root(&mut registry, &root).unwrap();

        let expected = directories_under(&root);
        prop_assert_eq!(added, expected.len());
        prop_assert_eq!(tree.len(), expected.len());
        prop_assert_eq!(registry.active_count(), expected.len());
        for dir in &expected {
            prop_assert!(tree.contains_path(dir));
        }
    }

    #[test]
    fn test_subtree_removal_is_complete_and_exact(
        dirs in tree_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        // Invariant: removal takes the prefix and all descendants, and nothing else
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for dir in &dirs {
            fs::create_dir_all(root.join(dir)).unwrap();
        }

        let mut registry = CountingRegistry::new();
        let mut tree = WatchTree::new();
        tree.register_root(&mut registry, &root).unwrap();

        let all: Vec<PathBuf> = {
            let mut all: Vec<_> = directories_under(&root).into_iter().collect();
            all.sort();
            all
        };
        let prefix = pick.get(&all).clone();
        let below: Vec<&PathBuf> = all.iter().filter(|p| p.starts_with(&prefix)).collect();

        let removed = tree.unregister_subtree(&mut registry, &prefix).unwrap();

        prop_assert_eq!(removed, below.len());
        prop_assert_eq!(registry.removed.len(), below.len());
        prop_assert_eq!(tree.len(), all.len() - below.len());
        for (_, path) in tree.entries() {
            prop_assert!(!path.starts_with(&prefix));
        }
    }
}
