use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let proto_dir = PathBuf::from("proto");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto/");

    // Both halves are generated: the server hosts the vote procedure and the
    // CLI invokes it remotely.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("sitevote_descriptor.bin"))
        .compile_protos(&[proto_dir.join("sitevote/v1/vote.proto")], &[&proto_dir])?;

    Ok(())
}
