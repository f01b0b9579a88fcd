// tests/descriptor_properties.rs

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use neurodrive::errors::NeurodriveError;
use neurodrive::types::ModelKind;
use neurodrive::worker::{WorkerDescriptor, descriptors_for};
use neurodrive_test_utils::SettingsBuilder;

fn slot_strategy() -> impl Strategy<Value = ModelKind> {
    prop::sample::select(ModelKind::WORKER_SLOTS.to_vec())
}

fn model_strategy() -> impl Strategy<Value = ModelKind> {
    prop::sample::select(
        ModelKind::WORKER_SLOTS
            .into_iter()
            .chain([ModelKind::None])
            .collect::<Vec<_>>(),
    )
}

// Absolute script paths built from plain path segments.
fn script_path_strategy() -> impl Strategy<Value = PathBuf> {
    (
        prop::collection::vec("[a-zA-Z0-9_-]{1,8}", 0..4),
        "[a-z]{1,8}\\.py",
    )
        .prop_map(|(dirs, file)| {
            let mut path = PathBuf::from("/");
            for dir in dirs {
                path.push(dir);
            }
            path.push(file);
            path
        })
}

proptest! {
    #[test]
    fn working_directory_is_the_script_parent(
        kind in slot_strategy(),
        script in script_path_strategy(),
        args in prop::collection::vec("[a-z0-9-]{1,6}", 0..3),
    ) {
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let settings = SettingsBuilder::new()
            .worker(kind, script.to_str().unwrap(), &arg_refs)
            .build();

        let d = WorkerDescriptor::build(kind, &settings).unwrap();

        prop_assert_eq!(d.kind(), kind);
        prop_assert_eq!(d.script_path(), script.as_path());
        prop_assert_eq!(d.working_directory(), script.parent().unwrap_or(Path::new("/")));
        prop_assert_eq!(d.interpreter(), "python3");
        prop_assert_eq!(d.arguments().len(), 1 + args.len());
        prop_assert_eq!(&d.arguments()[0], script.to_str().unwrap());
        prop_assert_eq!(&d.arguments()[1..], args.as_slice());
    }

    #[test]
    fn blank_script_never_builds(
        kind in slot_strategy(),
        blank in "[ \t]{0,4}",
    ) {
        let settings = SettingsBuilder::new().script(kind, &blank).build();
        let err = WorkerDescriptor::build(kind, &settings).unwrap_err();
        prop_assert!(matches!(err, NeurodriveError::MissingScript(k) if k == kind));
    }

    #[test]
    fn one_descriptor_per_constituent(model in model_strategy()) {
        let settings = SettingsBuilder::with_all_scripts().build();
        let built = descriptors_for(model, &settings);

        let slots: Vec<ModelKind> = built.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(slots.as_slice(), model.constituents());
        for (slot, descriptor) in &built {
            let descriptor = descriptor.as_ref().unwrap();
            prop_assert_eq!(descriptor.kind(), *slot);
        }
        prop_assert_eq!(built.len() == 3, model == ModelKind::Combined);
    }
}
