#![allow(
    clippy::expect_used,
    reason = "prerequisite tests use expect for descriptive failures"
)]

//! Tests for prerequisite splitting and resolution.

use filedb::dep::{NoSearch, SearchPath, split_prereqs};
use filedb::{Dep, FileDb, StemCapture};
use rstest::rstest;

fn names(deps: &[Dep]) -> Vec<&str> {
    deps.iter().map(|d| d.name.as_deref().unwrap_or("")).collect()
}

#[rstest]
fn splits_normal_and_order_only_prereqs() {
    let deps = split_prereqs("a b | c d", None, &NoSearch);
    assert_eq!(names(&deps), ["a", "b", "c", "d"]);
    let flags: Vec<bool> = deps.iter().map(|d| d.ignore_mtime).collect();
    assert_eq!(flags, [false, false, true, true]);
}

#[rstest]
fn only_the_first_pipe_is_a_delimiter() {
    let deps = split_prereqs("a | b | c", None, &NoSearch);
    assert_eq!(names(&deps), ["a", "b", "|", "c"]);
    assert!(deps.iter().skip(1).all(|d| d.ignore_mtime));
}

#[rstest]
fn empty_text_yields_no_edges() {
    assert!(split_prereqs("", None, &NoSearch).is_empty());
    assert!(split_prereqs("   \t ", None, &NoSearch).is_empty());
}

#[rstest]
fn wait_word_marks_the_following_edge() {
    let deps = split_prereqs("a .WAIT b c", None, &NoSearch);
    assert_eq!(names(&deps), ["a", "b", "c"]);
    let waits: Vec<bool> = deps.iter().map(|d| d.wait_here).collect();
    assert_eq!(waits, [false, true, false]);
}

#[rstest]
fn search_dir_prefixes_every_name() {
    let deps = split_prereqs("x.c y.c", Some("lib/"), &NoSearch);
    assert_eq!(names(&deps), ["lib/x.c", "lib/y.c"]);
}

struct MapSearch;

impl SearchPath for MapSearch {
    fn rewrite(&self, name: &str) -> Option<String> {
        (name == "found.c").then(|| "src/found.c".to_owned())
    }
}

#[rstest]
fn search_path_rewrite_applies_per_name() {
    let deps = split_prereqs("found.c missing.c", None, &MapSearch);
    assert_eq!(names(&deps), ["src/found.c", "missing.c"]);
}

#[rstest]
fn enter_prereqs_resolves_and_marks_explicit() {
    let mut db = FileDb::new();
    let owner = db.intern("prog");
    let deps = split_prereqs("main.o util.o", None, &NoSearch);
    let deps = db.enter_prereqs(deps, Some(owner)).expect("enter_prereqs");

    assert_eq!(deps.len(), 2);
    for dep in &deps {
        let id = dep.file.expect("edge should be resolved");
        assert!(dep.name.is_none());
        assert!(db.node(id).is_explicit, "owner has no stem: explicit");
    }
}

#[rstest]
fn enter_prereqs_skips_edges_awaiting_second_expansion() {
    let mut db = FileDb::new();
    let owner = db.intern("prog");
    let mut dep = Dep::new("$$(OBJS)");
    dep.need_second_expansion = true;
    let deps = db.enter_prereqs(vec![dep], Some(owner)).expect("enter_prereqs");

    assert_eq!(deps.len(), 1);
    assert!(deps[0].file.is_none());
    assert_eq!(deps[0].name.as_deref(), Some("$$(OBJS)"));
}

#[rstest]
fn stem_substitution_fills_the_marker() {
    let mut db = FileDb::new();
    let owner = db.intern("hello.o");
    db.node_mut(owner).stem = Some("hello".to_owned());

    let mut dep = Dep::new("%.c");
    dep.stem = Some(StemCapture::new("hello"));
    let deps = db.enter_prereqs(vec![dep], Some(owner)).expect("enter_prereqs");

    assert_eq!(deps.len(), 1);
    let id = deps[0].file.expect("resolved");
    assert_eq!(db.node(id).name, "hello.c");
    assert!(
        !db.node(id).is_explicit,
        "pattern-introduced prerequisites are not explicit"
    );
}

#[rstest]
fn stem_substitution_prepends_the_stem_directory() {
    let mut db = FileDb::new();
    let owner = db.intern("lib/hello.o");
    db.node_mut(owner).stem = Some("lib/hello".to_owned());

    let mut dep = Dep::new("pre-%.c");
    dep.stem = Some(StemCapture::split("lib/hello", 4));
    let deps = db.enter_prereqs(vec![dep], Some(owner)).expect("enter_prereqs");

    let id = deps[0].file.expect("resolved");
    assert_eq!(db.node(id).name, "lib/pre-hello.c");
}

#[rstest]
fn empty_stem_substitution_drops_the_edge_silently() {
    let mut db = FileDb::new();
    let owner = db.intern("out");
    db.node_mut(owner).stem = Some(String::new());

    let mut dep = Dep::new("%");
    dep.stem = Some(StemCapture::new(""));
    let mut keeper = Dep::new("keep.c");
    keeper.stem = Some(StemCapture::new(""));

    let deps = db
        .enter_prereqs(vec![dep, keeper], Some(owner))
        .expect("enter_prereqs");
    assert_eq!(deps.len(), 1);
    let id = deps[0].file.expect("resolved");
    assert_eq!(db.node(id).name, "keep.c");
}

#[rstest]
fn marker_free_names_keep_their_text_under_a_stem() {
    let mut db = FileDb::new();
    let owner = db.intern("lib/hello.o");
    db.node_mut(owner).stem = Some("lib/hello".to_owned());

    let mut dep = Dep::new("global.h");
    dep.stem = Some(StemCapture::split("lib/hello", 4));
    let deps = db.enter_prereqs(vec![dep], Some(owner)).expect("enter_prereqs");

    // No marker: the stem directory is not prepended.
    let id = deps[0].file.expect("resolved");
    assert_eq!(db.node(id).name, "global.h");
}
