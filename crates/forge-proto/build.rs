fn main() {
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/reporting.proto"], &["proto"])
        .expect("failed to compile reporting.proto");
}
