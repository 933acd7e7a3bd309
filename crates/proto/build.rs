// Path: crates/proto/build.rs
fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    // Compile the three packages together so relative imports resolve.
    // Map fields must land in BTreeMap: proposal bytes are hashed by both
    // client and replica, so encoding may not depend on map iteration order.
    tonic_build::configure()
        .btree_map(["."])
        .build_server(true)
        .compile(
            &[
                "proto/common.proto",
                "proto/peer.proto",
                "proto/orderer.proto",
            ],
            &["proto"],
        )?;
    Ok(())
}
