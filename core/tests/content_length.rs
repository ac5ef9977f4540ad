//! Plain `Content-Length` requests against the live echo server, sent with
//! ureq, to pin down the echo independently of the chunked client.

mod common;

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent()
}

#[test]
fn post_body_is_echoed() {
    let addr = common::start_server();

    let mut response = agent()
        .post(&format!("http://{addr}/foo/test"))
        .content_type("text/plain")
        .send("hello".as_bytes())
        .expect("HTTP transport error");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(response.body_mut().read_to_string().unwrap(), "hello");
}

#[test]
fn get_without_body_is_empty_ok() {
    let addr = common::start_server();

    let mut response = agent()
        .get(&format!("http://{addr}/anything"))
        .call()
        .expect("HTTP transport error");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.body_mut().read_to_string().unwrap(), "");
}
