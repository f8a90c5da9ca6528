use crate::test_support::FIXTURE_JSON;
use crate::{AttachmentKind, BlendMode, ConstraintKind, Error, SkeletonData, TimelineKind};

fn kinds(data: &SkeletonData, animation: &str) -> Vec<TimelineKind> {
    data.animation(animation)
        .unwrap_or_else(|| panic!("missing animation {animation:?}"))
        .timelines
        .iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn fixture_header_and_collections() {
    let data = SkeletonData::from_json_str(FIXTURE_JSON).unwrap();
    assert_eq!(data.hash.as_deref(), Some("fixturehash"));
    assert_eq!(data.version.as_deref(), Some("4.3.39"));
    assert_eq!(
        (data.x, data.y, data.width, data.height),
        (Some(-100.0), Some(0.0), Some(200.0), Some(300.0))
    );
    assert_eq!(data.reference_scale, 100.0);

    let bones: Vec<_> = data.bones.iter().map(|b| (b.name.as_str(), b.parent)).collect();
    assert_eq!(bones, [("root", None), ("hip", Some(0))]);
    assert_eq!(data.slots[0].bone, 1);
    assert_eq!(data.slots[1].attachment.as_deref(), Some("shadow"));

    let default = data.skin("default").unwrap();
    assert_eq!(default.attachment_count(), 2);
    assert_eq!(
        default.attachments[1].get("shadow"),
        Some(&AttachmentKind::BoundingBox)
    );
    let red = data.skin("red").unwrap();
    assert_eq!(red.constraints, ["aim"]);
    assert_eq!(red.entries().collect::<Vec<_>>(), [(0, "red-body")]);

    assert_eq!(data.events[0].audio_path.as_deref(), Some("step.ogg"));
    assert_eq!(data.audio_paths(), ["step.ogg"]);
    assert_eq!(data.constraints_of(ConstraintKind::Ik).count(), 1);
}

#[test]
fn fixture_animations_keep_file_order_and_durations() {
    let data = SkeletonData::from_json_str(FIXTURE_JSON).unwrap();
    let names: Vec<_> = data.animations.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["idle", "walk"]);

    assert_eq!(data.animation("idle").unwrap().duration, 1.5);
    assert_eq!(
        kinds(&data, "idle"),
        [TimelineKind::Rgba, TimelineKind::Rotate]
    );

    let walk = data.animation("walk").unwrap();
    assert_eq!(walk.duration, 0.5);
    assert_eq!(
        kinds(&data, "walk"),
        [
            TimelineKind::Translate,
            TimelineKind::IkConstraint,
            TimelineKind::DrawOrder,
            TimelineKind::Event,
        ]
    );
    assert!(walk.timelines.iter().all(|t| t.frame_count >= 1));
}

#[test]
fn legacy_skin_map_and_constraint_arrays() {
    let data = SkeletonData::from_json_str(
        r#"{
            "skeleton": { "spine": "4.1.24" },
            "bones": [ { "name": "root" } ],
            "slots": [ { "name": "a", "bone": "root", "blend": "additive" } ],
            "ik": [ { "name": "reach" } ],
            "transform": [ { "name": "follow" } ],
            "path": [ { "name": "rail" } ],
            "skins": {
                "default": { "a": { "a": {}, "a-mesh": { "type": "mesh" } } },
                "alt": { "a": { "clip": { "type": "clipping" } } }
            },
            "animations": {
                "bend": {
                    "deform": { "default": { "a": { "a-mesh": [ { "time": 0.75 } ] } } },
                    "draworder": [ { "time": 1.25 } ]
                }
            }
        }"#,
    )
    .unwrap();

    assert_eq!(data.slots[0].blend, BlendMode::Additive);
    let skins: Vec<_> = data.skins.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skins, ["default", "alt"]);
    assert_eq!(
        data.skin("default").unwrap().attachments[0].get("a-mesh"),
        Some(&AttachmentKind::Mesh)
    );
    assert_eq!(data.constraints_of(ConstraintKind::Ik).count(), 1);
    assert_eq!(data.constraints_of(ConstraintKind::Transform).count(), 1);
    assert_eq!(data.constraints_of(ConstraintKind::Path).count(), 1);

    let bend = data.animation("bend").unwrap();
    assert_eq!(bend.duration, 1.25);
    assert_eq!(
        kinds(&data, "bend"),
        [TimelineKind::Deform, TimelineKind::DrawOrder]
    );
}

#[test]
fn constraint_animations_cover_every_kind() {
    let data = SkeletonData::from_json_str(
        r#"{
            "bones": [ { "name": "root" } ],
            "slots": [ { "name": "s", "bone": "root" } ],
            "constraints": [
                { "type": "transform", "name": "t" },
                { "type": "path", "name": "p" },
                { "type": "physics", "name": "ph" },
                { "type": "slider", "name": "sl" }
            ],
            "skins": [ { "name": "default", "attachments": { "s": { "m": { "type": "mesh" } } } } ],
            "animations": {
                "all": {
                    "transform": { "t": [ {}, { "time": 0.5 } ] },
                    "path": { "p": { "position": [ {} ], "mix": [ { "time": 2 } ] } },
                    "physics": { "": { "reset": [ { "time": 0.25 } ] }, "ph": { "wind": [ {} ] } },
                    "slider": { "sl": { "time": [ {} ] } },
                    "attachments": { "default": { "s": { "m": { "deform": [ {} ], "sequence": [ {} ] } } } }
                }
            }
        }"#,
    )
    .unwrap();

    assert_eq!(data.animation("all").unwrap().duration, 2.0);
    assert_eq!(
        kinds(&data, "all"),
        [
            TimelineKind::TransformConstraint,
            TimelineKind::PathPosition,
            TimelineKind::PathMix,
            TimelineKind::PhysicsReset,
            TimelineKind::PhysicsWind,
            TimelineKind::SliderTime,
            TimelineKind::Deform,
            TimelineKind::Sequence,
        ]
    );
}

#[test]
fn empty_timelines_are_not_counted() {
    let data = SkeletonData::from_json_str(
        r#"{
            "bones": [ { "name": "root" } ],
            "animations": { "still": { "bones": { "root": { "rotate": [] } }, "events": [] } }
        }"#,
    )
    .unwrap();
    let still = data.animation("still").unwrap();
    assert!(still.timelines.is_empty());
    assert_eq!(still.duration, 0.0);
}

#[test]
fn header_is_optional() {
    let data = SkeletonData::from_json_str("{}").unwrap();
    assert_eq!(data.hash, None);
    assert_eq!(data.width, None);
    assert_eq!(data.reference_scale, 100.0);
    assert!(data.bones.is_empty());
}

#[test]
fn unknown_references_are_rejected() {
    let cases = [
        r#"{"bones":[{"name":"a","parent":"ghost"}]}"#,
        r#"{"bones":[{"name":"root"}],"slots":[{"name":"s","bone":"ghost"}]}"#,
        r#"{"skins":[{"name":"default","attachments":{"ghost":{"a":{}}}}]}"#,
        r#"{"bones":[{"name":"root"}],"slots":[{"name":"s","bone":"root"}],
            "skins":[{"name":"default","attachments":{"s":{"a":{"type":"sprite"}}}}]}"#,
        r#"{"animations":{"a":{"bones":{"ghost":{"rotate":[{}]}}}}}"#,
        r#"{"animations":{"a":{"ik":{"ghost":[{}]}}}}"#,
        r#"{"animations":{"a":{"events":[{"name":"ghost"}]}}}"#,
    ];
    let errors: Vec<Error> = cases
        .iter()
        .map(|input| SkeletonData::from_json_str(input).unwrap_err())
        .collect();

    assert!(matches!(&errors[0], Error::JsonUnknownBoneParent { bone, parent }
        if bone == "a" && parent == "ghost"));
    assert!(matches!(&errors[1], Error::JsonUnknownSlotBone { slot, .. } if slot == "s"));
    assert!(matches!(&errors[2], Error::JsonUnknownSkinSlot { skin, slot }
        if skin == "default" && slot == "ghost"));
    assert!(matches!(&errors[3], Error::JsonUnsupportedAttachmentType { attachment_type, .. }
        if attachment_type == "sprite"));
    assert!(matches!(&errors[4], Error::JsonUnknownAnimationTarget { kind: "bone", name, .. }
        if name == "ghost"));
    assert!(matches!(&errors[5], Error::JsonUnknownAnimationTarget { kind: "ik constraint", .. }));
    assert!(matches!(&errors[6], Error::JsonUnknownEvent { event, .. } if event == "ghost"));
}

#[test]
fn malformed_input_is_rejected() {
    assert!(matches!(
        SkeletonData::from_json_str("{"),
        Err(Error::JsonParse { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(r#"{"bones":[{"parent":"root"}]}"#),
        Err(Error::JsonParse { .. })
    ));
    let err = SkeletonData::from_json_str(r#"{"skeleton":{"spine":"3.8.99"}}"#).unwrap_err();
    assert!(matches!(&err, Error::JsonSpineVersion { value } if value == "3.8.99"));
    assert_eq!(
        err.to_string(),
        "unsupported or invalid Spine version string: 3.8.99"
    );
    for version in ["4.0.64", "4.4.0"] {
        let text = format!(r#"{{"skeleton":{{"spine":"{version}"}}}}"#);
        assert!(
            matches!(SkeletonData::from_json_str(&text), Err(Error::JsonSpineVersion { .. })),
            "{version}"
        );
    }
}
