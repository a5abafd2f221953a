//! A cancelled run must leave the project exactly as it found it.

mod common;

use std::sync::Arc;

use common::prelude::*;
use gensync::{execute_run, CancellationToken, Error, Generator, OutputFile, ProviderType};

/// Root exports a value its child depends on, so the child builds on a
/// later level. The root's build can cancel the run while it is in flight.
fn two_levels(content: &'static str, cancel: Option<CancellationToken>) -> Arc<dyn Generator> {
    let version: ProviderType<String> = ProviderType::exclusive("version");
    let (declared, published, wanted, read) =
        (version.clone(), version.clone(), version.clone(), version);
    Arc::new(FnGenerator::new(
        move |d| {
            d.exports(&declared);
            let (wanted, read) = (wanted.clone(), read.clone());
            d.child(
                "child",
                FnGenerator::new(
                    move |d| {
                        d.depends_on(&wanted);
                    },
                    move |ctx| {
                        let v = ctx.get(&read)?;
                        ctx.add_file(OutputFile::text("child.txt", format!("{}\n", v)))
                    },
                ),
            );
        },
        move |ctx| {
            if let Some(token) = &cancel {
                token.cancel();
            }
            ctx.export(&published, content.to_string())?;
            ctx.add_file(OutputFile::text("root.txt", content))
        },
    ))
}

#[test]
fn test_cancel_mid_run_leaves_disk_and_snapshot_identical() {
    let project = Project::new();
    project.run(two_levels("v1", None));
    project.write("root.txt", "edited");
    let before = project.tree();
    assert!(before.iter().any(|(p, _)| p.ends_with("snapshot.json")));

    let cancel = CancellationToken::new();
    let options = project.options().cancel_token(cancel.clone());
    let err = execute_run("app", two_levels("v2", Some(cancel)), &options).unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(project.tree(), before);
}

#[test]
fn test_cancel_before_start_builds_nothing() {
    let project = Project::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = project.options().cancel_token(cancel);

    let err = execute_run("app", two_levels("v1", None), &options).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(project.tree().is_empty());
}
