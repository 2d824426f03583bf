#![allow(
    clippy::expect_used,
    reason = "registry tests use expect for descriptive failures"
)]

//! Tests for the file registry: interning, double-colon chains,
//! renames and merges.

use filedb::file::Commands;
use filedb::{FileDb, FileDbError, FileTime};
use rstest::rstest;
use std::rc::Rc;

#[rstest]
fn intern_twice_returns_the_same_record() {
    let mut db = FileDb::new();
    let a = db.intern("x");
    let b = db.intern("x");
    assert_eq!(a, b);
    assert_eq!(db.node(a).name, "x");
}

#[rstest]
fn intern_normalizes_before_lookup() {
    let mut db = FileDb::new();
    let a = db.intern("./src//./main.o");
    let b = db.intern("src/main.o");
    assert_eq!(a, b);
    assert_eq!(db.lookup(".//src/main.o"), Some(a));
}

#[rstest]
fn reentry_demotes_builtin_status() {
    let mut db = FileDb::new();
    let a = db.intern("x");
    db.node_mut(a).builtin = true;
    let b = db.intern("x");
    assert_eq!(a, b);
    assert!(!db.node(a).builtin);
}

#[rstest]
fn double_colon_registration_chains_distinct_records() {
    let mut db = FileDb::new();
    let first = db.intern("x");
    db.set_double_colon(first);
    let second = db.intern("x");
    assert_ne!(first, second);

    // Both members share the key and link through the chain fields.
    assert_eq!(db.node(first).hname, db.node(second).hname);
    assert_eq!(db.node(second).double_colon, Some(first));
    assert_eq!(db.node(first).prev, Some(second));
    assert_eq!(db.node(first).last, second);
    assert_eq!(db.chain_ids(second), vec![first, second]);

    // Each member holds its own dependency list.
    db.node_mut(first).deps.push(filedb::Dep::new("a"));
    assert!(db.node(second).deps.is_empty());

    // Lookup still finds the head; a third registration extends the
    // chain at the tail.
    assert_eq!(db.lookup("x"), Some(first));
    let third = db.intern("x");
    assert_eq!(db.node(second).prev, Some(third));
    assert_eq!(db.node(first).last, third);
}

#[rstest]
fn rename_with_unused_name_is_a_pure_rekey() {
    let mut db = FileDb::new();
    let a = db.intern("old");
    db.rename(a, "new").expect("rename should succeed");
    assert_eq!(db.node(a).name, "new");
    assert_eq!(db.node(a).hname, "new");
    assert_eq!(db.lookup("new"), Some(a));
    assert_eq!(db.lookup("old"), None);
}

#[rstest]
fn rehash_changes_key_but_not_display_name() {
    let mut db = FileDb::new();
    let a = db.intern("old");
    db.rehash(a, "new").expect("rehash should succeed");
    assert_eq!(db.node(a).name, "old");
    assert_eq!(db.node(a).hname, "new");
    assert_eq!(db.lookup("new"), Some(a));
}

#[rstest]
fn merge_prefers_destination_recipe_and_skips_intermediate() {
    let mut db = FileDb::new();
    let from = db.intern("vpath/x");
    let to = db.intern("x");

    db.node_mut(from).cmds = Some(Rc::new(Commands::new("build it")));
    db.node_mut(from).phony = true;
    db.node_mut(from).intermediate = true;
    db.node_mut(to).precious = true;

    db.rename(from, "x").expect("merge should succeed");

    let to_node = db.node(to);
    assert_eq!(
        to_node.cmds.as_ref().map(|c| c.recipe.as_str()),
        Some("build it"),
        "destination without a recipe adopts the source's"
    );
    assert!(to_node.phony);
    assert!(to_node.precious);
    assert!(
        !to_node.intermediate,
        "intermediate must not be inherited through a merge"
    );
}

#[rstest]
fn merge_concatenates_deps_destination_first() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    let to = db.intern("b");
    db.node_mut(from).deps.push(filedb::Dep::new("from-dep"));
    db.node_mut(to).deps.push(filedb::Dep::new("to-dep"));

    db.rename(from, "b").expect("merge should succeed");

    let names: Vec<&str> = db
        .node(to)
        .deps
        .iter()
        .map(|d| d.name.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(names, ["to-dep", "from-dep"]);
}

#[rstest]
fn merge_takes_the_larger_timestamp() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    let to = db.intern("b");
    let newer = FileTime::from_unix(None, 2_000, 0);
    let older = FileTime::from_unix(None, 1_000, 0);
    db.node_mut(from).last_mtime = newer;
    db.node_mut(to).last_mtime = older;

    db.rename(from, "b").expect("merge should succeed");
    assert_eq!(db.node(to).last_mtime, newer);
}

#[rstest]
fn merged_record_becomes_a_forwarding_stub() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    let to = db.intern("b");
    db.rename(from, "b").expect("merge should succeed");

    assert_eq!(db.node(from).renamed, Some(to));
    assert_eq!(db.resolve(from), to);
    assert_eq!(db.lookup("a"), None);
    assert_eq!(db.lookup("b"), Some(to));
}

#[rstest]
fn merging_single_colon_target_into_double_colon_is_fatal() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    db.node_mut(from).is_target = true;
    let to = db.intern("b");
    db.set_double_colon(to);
    db.node_mut(to).is_target = true;

    let err = db.rename(from, "b").expect_err("colon conflict expected");
    assert_eq!(
        err,
        FileDbError::SingleToDoubleColon {
            from: "a".to_owned(),
            to: "b".to_owned(),
        }
    );
}

#[rstest]
fn merging_double_colon_into_single_colon_target_is_fatal() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    db.set_double_colon(from);
    let to = db.intern("b");
    db.node_mut(to).is_target = true;

    let err = db.rename(from, "b").expect_err("colon conflict expected");
    assert_eq!(
        err,
        FileDbError::DoubleToSingleColon {
            from: "a".to_owned(),
            to: "b".to_owned(),
        }
    );
}

#[rstest]
fn failed_colon_conflict_rename_leaves_the_db_untouched() {
    let mut db = FileDb::new();
    let from = db.intern("a");
    db.node_mut(from).is_target = true;
    db.node_mut(from).deps.push(filedb::Dep::new("a-dep"));
    let to = db.intern("b");
    db.set_double_colon(to);
    db.node_mut(to).is_target = true;

    db.rename(from, "b").expect_err("colon conflict expected");

    // The rejected rename must not have moved anything.
    assert_eq!(db.lookup("a"), Some(from));
    assert_eq!(db.node(from).name, "a");
    assert_eq!(db.node(from).hname, "a");
    assert!(db.node(from).renamed.is_none());
    assert_eq!(db.node(from).deps.len(), 1);
    assert!(db.node(to).deps.is_empty());
    db.verify().expect("database still consistent");
}

#[rstest]
fn case_insensitive_db_folds_names_except_dot_names() {
    let mut db = FileDb::new_case_insensitive();
    let a = db.intern("Foo.O");
    assert_eq!(db.lookup("foo.o"), Some(a));
    assert_eq!(db.lookup("FOO.o"), Some(a));

    let phony = db.intern(".PHONY");
    assert_eq!(db.node(phony).hname, ".PHONY");
    assert_eq!(db.lookup(".phony"), None);
}

#[rstest]
fn verify_accepts_a_healthy_database() {
    let mut db = FileDb::new();
    let a = db.intern("a");
    let deps = vec![filedb::Dep::new("b")];
    let deps = db.enter_prereqs(deps, Some(a)).expect("enter_prereqs");
    db.node_mut(a).deps = deps;
    db.verify().expect("verify should pass");
}

#[rstest]
fn verify_rejects_an_out_of_bounds_stem_offset() {
    let mut db = FileDb::new();
    let a = db.intern("a");
    let mut dep = filedb::Dep::new("b");
    dep.stem = Some(filedb::StemCapture {
        text: "abc".to_owned(),
        basename: 7,
    });
    db.node_mut(a).deps.push(dep);

    let err = db.verify().expect_err("corrupt stem bound expected");
    assert!(matches!(err, FileDbError::Corrupt { .. }));
}

#[rstest]
fn target_list_names_every_target() {
    let mut db = FileDb::new();
    let a = db.intern("a");
    db.intern("b");
    let c = db.intern("c");
    db.node_mut(a).is_target = true;
    db.node_mut(c).is_target = true;
    assert_eq!(db.target_list(), "a c");
}

#[rstest]
fn command_state_raises_also_make_siblings() {
    use filedb::CommandState;

    let mut db = FileDb::new();
    let main = db.intern("out.a");
    let sibling = db.intern("out.b");
    db.node_mut(main).also_make.push(sibling);
    db.node_mut(sibling).command_state = CommandState::Finished;

    db.set_command_state(main, CommandState::Running);
    assert_eq!(db.node(main).command_state, CommandState::Running);
    assert_eq!(
        db.node(sibling).command_state,
        CommandState::Finished,
        "sibling state is never lowered"
    );

    let other = db.intern("out.c");
    db.node_mut(main).also_make.push(other);
    db.set_command_state(main, CommandState::Finished);
    assert_eq!(db.node(other).command_state, CommandState::Finished);
}
