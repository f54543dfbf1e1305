//! Data source paging, filtering and bypass listing against a mock API

mod common;

use common::{action, envelope, values};
use mockito::Matcher;
use serde_json::json;
use tfdispatch::data_source::ReadDataSourceRequest;
use tfdispatch::Dynamic;

#[tokio::test(flavor = "multi_thread")]
async fn acls_follow_page_numbers_and_name_regex() {
    let mut server = common::server().await;
    let provider = common::provider(&server.url());
    let data_source = provider.data_source("volcengine_acls").unwrap();

    let full_page: Vec<_> = (0..100)
        .map(|i| json!({"AclId": format!("acl-{i}"), "AclName": format!("other-{i}"), "Status": "Active"}))
        .collect();
    let page_one = server
        .mock("GET", "/")
        .match_query(action("DescribeAcls", &[("PageNumber", "1"), ("PageSize", "100")]))
        .with_body(envelope("DescribeAcls", json!({"Acls": full_page, "TotalCount": 102})))
        .expect(1)
        .create_async()
        .await;
    let page_two = server
        .mock("GET", "/")
        .match_query(action("DescribeAcls", &[("PageNumber", "2")]))
        .with_body(envelope(
            "DescribeAcls",
            json!({"Acls": [
                {"AclId": "acl-a", "AclName": "acc-test-acl", "AclEntryCount": 2, "Listeners": ["lsn-1"]},
                {"AclId": "acl-b", "AclName": "acc-test-acl-2", "AclEntryCount": 0, "Listeners": []}
            ], "TotalCount": 102}),
        ))
        .expect(1)
        .create_async()
        .await;

    let response = data_source
        .read(ReadDataSourceRequest {
            config: values(&[("name_regex", Dynamic::string("^acc-test"))]),
        })
        .await;
    assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
    page_one.assert_async().await;
    page_two.assert_async().await;

    let state = response.state.unwrap();
    assert_eq!(state.get_number("total_count"), Some(2.0));
    let acls = state.get_list("acls");
    assert_eq!(acls.len(), 2);
    let first = acls[0].as_map().unwrap();
    assert_eq!(first["id"].as_string(), Some("acl-a"));
    assert_eq!(first["acl_entry_count"].as_number(), Some(2.0));
    assert_eq!(first["listeners"].as_list().map(|l| l.len()), Some(1));
    assert!(!state.id().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn acls_ids_are_sent_as_indexed_keys() {
    let mut server = common::server().await;
    let provider = common::provider(&server.url());
    let data_source = provider.data_source("volcengine_acls").unwrap();

    let query = server
        .mock("GET", "/")
        .match_query(action("DescribeAcls", &[("AclIds.1", "acl-a")]))
        .with_body(envelope("DescribeAcls", json!({"Acls": [{"AclId": "acl-a", "AclName": "x"}]})))
        .expect(1)
        .create_async()
        .await;

    let response = data_source
        .read(ReadDataSourceRequest {
            config: values(&[("ids", Dynamic::from(vec!["acl-a"]))]),
        })
        .await;
    assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
    query.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ecs_instances_follow_next_token() {
    let mut server = common::server().await;
    let provider = common::provider(&server.url());
    let data_source = provider.data_source("volcengine_ecs_instances").unwrap();

    // the continued request also matches the first mock, so it is created first
    let second = server
        .mock("GET", "/")
        .match_query(action("DescribeInstances", &[("NextToken", "t-1")]))
        .with_body(envelope(
            "DescribeInstances",
            json!({"Instances": [{
                "InstanceId": "i-2",
                "InstanceName": "worker",
                "Status": "STOPPED",
                "NetworkInterfaces": [{"PrimaryIpAddress": "10.0.0.3", "SubnetId": "subnet-2"}]
            }], "NextToken": ""}),
        ))
        .expect(1)
        .create_async()
        .await;
    let first = server
        .mock("GET", "/")
        .match_query(action(
            "DescribeInstances",
            &[("MaxResults", "100"), ("VpcId", "vpc-1")],
        ))
        .with_body(envelope(
            "DescribeInstances",
            json!({"Instances": [{
                "InstanceId": "i-1",
                "InstanceName": "web",
                "Status": "RUNNING",
                "Cpus": 2,
                "MemorySize": 4096,
                "Tags": [{"Key": "env", "Value": "test"}],
                "NetworkInterfaces": [{"PrimaryIpAddress": "10.0.0.2", "SubnetId": "subnet-1"}]
            }], "NextToken": "t-1"}),
        ))
        .expect(1)
        .create_async()
        .await;

    let response = data_source
        .read(ReadDataSourceRequest {
            config: values(&[("vpc_id", Dynamic::string("vpc-1"))]),
        })
        .await;
    assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
    first.assert_async().await;
    second.assert_async().await;

    let state = response.state.unwrap();
    let instances = state.get_list("instances");
    assert_eq!(instances.len(), 2);
    let web = instances[0].as_map().unwrap();
    assert_eq!(web["primary_ip_address"].as_string(), Some("10.0.0.2"));
    assert_eq!(web["cpus"].as_number(), Some(2.0));
    assert_eq!(web["tags"].as_list().map(|t| t.len()), Some(1));
    let worker = instances[1].as_map().unwrap();
    assert_eq!(worker["subnet_id"].as_string(), Some("subnet-2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn tos_buckets_are_filtered_on_the_client() {
    let mut server = common::server().await;
    let provider = common::provider(&server.url());
    let data_source = provider.data_source("volcengine_tos_buckets").unwrap();

    let list = server
        .mock("GET", "/")
        .match_query(Matcher::Missing)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "Owner": {"ID": "2100"},
                "Buckets": [
                    {"Name": "logs", "Location": "cn-beijing", "CreationDate": "2024-03-09T08:30:00Z",
                     "ExtranetEndpoint": "tos-cn-beijing.volces.com",
                     "IntranetEndpoint": "tos-cn-beijing.ivolces.com"},
                    {"Name": "logs-archive", "Location": "cn-beijing"}
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let response = data_source
        .read(ReadDataSourceRequest {
            config: values(&[("bucket_name", Dynamic::string("logs"))]),
        })
        .await;
    assert!(!response.diagnostics.has_errors(), "{:?}", response.diagnostics.errors);
    list.assert_async().await;

    let state = response.state.unwrap();
    let buckets = state.get_list("buckets");
    assert_eq!(buckets.len(), 1);
    let logs = buckets[0].as_map().unwrap();
    assert_eq!(logs["id"].as_string(), Some("logs"));
    assert_eq!(logs["extranet_endpoint"].as_string(), Some("tos-cn-beijing.volces.com"));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_name_regex_is_reported() {
    let mut server = common::server().await;
    let provider = common::provider(&server.url());
    let data_source = provider.data_source("volcengine_acls").unwrap();
    let _any = server
        .mock("GET", "/")
        .match_query(action("DescribeAcls", &[]))
        .with_body(envelope("DescribeAcls", json!({"Acls": []})))
        .create_async()
        .await;

    let response = data_source
        .read(ReadDataSourceRequest {
            config: values(&[("name_regex", Dynamic::string("(["))]),
        })
        .await;
    assert!(response.diagnostics.has_errors());
    assert!(response.state.is_none());
}
