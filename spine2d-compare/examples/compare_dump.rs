use spine2d_compare::{SkeletonData, diff};
use std::path::PathBuf;
use std::sync::Arc;

fn load_json(path: &PathBuf) -> Arc<SkeletonData> {
    let json = std::fs::read_to_string(path).expect("read json");
    SkeletonData::from_json_str(&json).expect("parse json")
}

fn load_skel(path: &PathBuf) -> Arc<SkeletonData> {
    let bytes = std::fs::read(path).expect("read skel");
    SkeletonData::from_skel_bytes(&bytes).expect("parse skel")
}

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut as_json = false;

    for arg in args {
        match arg.as_str() {
            "--json" => as_json = true,
            _ => positional.push(arg),
        }
    }

    let json_path = positional.first().map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from("./assets/spine-runtimes/examples/spineboy/export/spineboy-pro.json")
    });
    let skel_path = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| json_path.with_extension("skel"));

    let a = load_json(&json_path);
    let b = load_skel(&skel_path);
    let report = diff(&a, &b);

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("serialize report")
        );
    } else {
        println!("A: {}", json_path.display());
        println!("B: {}", skel_path.display());
        print!("{report}");
    }

    if !report.is_empty() {
        std::process::exit(1);
    }
}
