use std::net::SocketAddr;

/// Start the echo server on a random loopback port, on its own runtime in a
/// background thread.
pub fn start_server() -> SocketAddr {
    start_server_with(echo_server::ServerConfig::default())
}

pub fn start_server_with(config: echo_server::ServerConfig) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            echo_server::run(listener, &config).await
        })
        .unwrap();
    });

    addr
}
