use std::fs;

use camino::Utf8PathBuf;

use kira_mirna_graph::cache::{CacheLookup, IdentifierCache};

fn cache_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join("lookup.tsv")).unwrap()
}

fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn earliest_record_wins_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_path(&dir);
    {
        let mut cache = IdentifierCache::open(&path, 2, 2).unwrap();
        cache
            .store(&["refseq", "NM_000546"], Some(&values(&["TP53", "7157"])))
            .unwrap();
        cache
            .store(&["refseq", "NM_000546"], Some(&values(&["OTHER", "1"])))
            .unwrap();
        assert_eq!(
            cache.lookup(&["refseq", "NM_000546"]),
            CacheLookup::Found(values(&["TP53", "7157"]))
        );
    }

    let cache = IdentifierCache::open(&path, 2, 2).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.lookup(&[" refseq ", "NM_000546"]),
        CacheLookup::Found(values(&["TP53", "7157"]))
    );
    let content = fs::read_to_string(path.as_std_path()).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn malformed_lines_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_path(&dir);
    fs::write(
        path.as_std_path(),
        "NM_1\tA\t1\nbroken line\nNM_2\tNOT_FOUND\tNOT_FOUND\nNM_3\tB\n",
    )
    .unwrap();

    let cache = IdentifierCache::open(&path, 1, 2).unwrap();
    assert_eq!(cache.skipped_lines(), 2);
    assert_eq!(cache.lookup(&["NM_1"]), CacheLookup::Found(values(&["A", "1"])));
    assert_eq!(cache.lookup(&["NM_2"]), CacheLookup::NotFound);
    assert_eq!(cache.lookup(&["NM_3"]), CacheLookup::Absent);
}

#[test]
fn compact_drops_duplicates_and_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_path(&dir);
    fs::write(
        path.as_std_path(),
        "NM_1\tA\t1\nNM_1\tZ\t9\ngarbage\nNM_2\tNOT_FOUND\tNOT_FOUND\n",
    )
    .unwrap();

    let mut cache = IdentifierCache::open(&path, 1, 2).unwrap();
    assert_eq!(cache.compact().unwrap(), 2);
    assert_eq!(cache.skipped_lines(), 0);
    assert_eq!(
        fs::read_to_string(path.as_std_path()).unwrap(),
        "NM_1\tA\t1\nNM_2\tNOT_FOUND\tNOT_FOUND\n"
    );

    cache.store(&["NM_3"], None).unwrap();
    cache.flush().unwrap();
    let reopened = IdentifierCache::open(&path, 1, 2).unwrap();
    assert_eq!(reopened.len(), 3);
    assert_eq!(reopened.lookup(&["NM_3"]), CacheLookup::NotFound);
}
