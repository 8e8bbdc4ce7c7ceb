mod common;

use std::time::Duration;

use common::{start_test_server, TestServer, PASSWORD};
use laptop_catalog::auth::{AccessPolicy, ROLE_ADMIN};
use laptop_catalog::client::{AuthClient, ClientAuthInterceptor, LaptopClient, CHUNK_SIZE};
use laptop_catalog::proto::laptop_service_client::LaptopServiceClient;
use laptop_catalog::proto::memory::Unit;
use laptop_catalog::proto::upload_image_request::Data;
use laptop_catalog::proto::{Cpu, Filter, ImageInfo, Laptop, Memory, UploadImageRequest};
use laptop_catalog::sample;
use laptop_catalog::store::{User, MAX_IMAGE_SIZE};
use tokio_stream::StreamExt;
use tonic::metadata::AsciiMetadataValue;
use tonic::{Code, Request};
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

async fn client_as(server: &TestServer, username: &str) -> LaptopClient {
    let channel = server.channel().await;
    let interceptor = ClientAuthInterceptor::new(
        AuthClient::new(channel.clone(), username, PASSWORD),
        AccessPolicy::catalog_default().protected_methods(),
        Duration::from_secs(30),
        Duration::from_secs(60),
    )
    .await
    .expect("login should succeed");

    LaptopClient::new(channel, interceptor)
}

fn memory(value: u64, unit: Unit) -> Memory {
    Memory {
        value,
        unit: unit as i32,
    }
}

fn qualifying_laptop() -> Laptop {
    let mut laptop = sample::new_laptop();
    laptop.price_usd = 1500.0;
    laptop.cpu = Some(Cpu {
        number_cores: 4,
        min_ghz: 2.5,
        ..Default::default()
    });
    laptop.ram = Some(memory(16, Unit::Gigabyte));
    laptop
}

#[tokio::test]
async fn create_with_and_without_id() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let laptop = sample::new_laptop();
    let id = client.create_laptop(laptop.clone()).await.unwrap();
    assert_eq!(id, laptop.id);
    assert_eq!(server.laptops.find(&id).await, Some(laptop));

    let mut anonymous = sample::new_laptop();
    anonymous.id.clear();
    let generated = client.create_laptop(anonymous).await.unwrap();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
    assert!(server.laptops.find(&generated).await.is_some());
}

#[tokio::test]
async fn create_rejects_duplicates_and_bad_ids() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let laptop = sample::new_laptop();
    client.create_laptop(laptop.clone()).await.unwrap();

    let mut copy = laptop.clone();
    copy.brand = "Other".to_string();
    let status = client.create_laptop(copy).await.unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(server.laptops.find(&laptop.id).await, Some(laptop));

    let mut invalid = sample::new_laptop();
    invalid.id = "invalid-uuid".to_string();
    let status = client.create_laptop(invalid).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn search_streams_only_qualifying_laptops() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let mut expected = Vec::new();
    for i in 0..6 {
        let mut laptop = qualifying_laptop();
        match i {
            0 => laptop.price_usd = 2500.0,
            1 => laptop.cpu.as_mut().unwrap().number_cores = 2,
            2 => laptop.cpu.as_mut().unwrap().min_ghz = 2.0,
            3 => laptop.ram = Some(memory(4096, Unit::Megabyte)),
            _ => expected.push(laptop.id.clone()),
        }
        client.create_laptop(laptop).await.unwrap();
    }

    let filter = Filter {
        max_price_usd: 2000.0,
        min_cpu_cores: 4,
        min_cpu_ghz: 2.2,
        min_ram: Some(memory(8, Unit::Gigabyte)),
    };

    let mut found: Vec<_> = client
        .search_laptop(filter)
        .await
        .unwrap()
        .into_iter()
        .map(|laptop| laptop.id)
        .collect();

    found.sort();
    expected.sort();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn upload_writes_image_to_disk() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let laptop_id = client.create_laptop(sample::new_laptop()).await.unwrap();
    let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();

    let response = client
        .upload_image(&laptop_id, ".jpg", &data)
        .await
        .unwrap();
    assert_eq!(response.size as usize, data.len());

    let info = server
        .images
        .find(&response.id)
        .await
        .expect("image should be indexed");
    assert_eq!(info.laptop_id, laptop_id);
    assert_eq!(tokio::fs::read(&info.path).await.unwrap(), data);
}

#[tokio::test]
async fn upload_rejects_oversized_image_and_unknown_laptop() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let laptop_id = client.create_laptop(sample::new_laptop()).await.unwrap();
    let data = vec![7u8; MAX_IMAGE_SIZE + 1];

    let status = client
        .upload_image(&laptop_id, ".png", &data)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .upload_image(&uuid::Uuid::new_v4().to_string(), ".png", b"tiny")
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let written = std::fs::read_dir(server.images.folder()).unwrap().count();
    assert_eq!(written, 0);
}

/// Sends `messages` and then keeps the upload open without ever finishing it.
async fn upload_left_open(
    server: &TestServer,
    messages: Vec<UploadImageRequest>,
) -> Result<tonic::Status, tokio::time::error::Elapsed> {
    let admin = User::with_hash("admin1", "", ROLE_ADMIN);
    let token = server.tokens.generate(&admin).unwrap();
    let mut client = LaptopServiceClient::new(server.channel().await);

    let mut request = Request::new(tokio_stream::iter(messages).chain(tokio_stream::pending()));
    let value: AsciiMetadataValue = format!("Bearer {token}").parse().unwrap();
    request.metadata_mut().insert("authorization", value);

    tokio::time::timeout(Duration::from_secs(5), client.upload_image(request))
        .await
        .map(|result| result.expect_err("upload should be rejected"))
}

fn image_info(laptop_id: &str) -> UploadImageRequest {
    UploadImageRequest {
        data: Some(Data::Info(ImageInfo {
            laptop_id: laptop_id.to_string(),
            image_type: ".png".to_string(),
        })),
    }
}

#[tokio::test]
async fn oversized_upload_fails_before_the_client_finishes() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;
    let laptop_id = client.create_laptop(sample::new_laptop()).await.unwrap();

    let oversized = UploadImageRequest {
        data: Some(Data::ChunkData(vec![1u8; MAX_IMAGE_SIZE + 1])),
    };

    let status = upload_left_open(&server, vec![image_info(&laptop_id), oversized])
        .await
        .expect("server should answer while the upload is still open");
    assert_eq!(status.code(), Code::InvalidArgument);

    let written = std::fs::read_dir(server.images.folder()).unwrap().count();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn upload_message_without_data_is_rejected() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;
    let laptop_id = client.create_laptop(sample::new_laptop()).await.unwrap();

    let empty = UploadImageRequest { data: None };

    let status = upload_left_open(&server, vec![image_info(&laptop_id), empty])
        .await
        .expect("server should answer while the upload is still open");
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("chunk data is missing"));
}

#[tokio::test]
async fn rating_streams_running_averages() {
    let server = start_test_server().await;
    let admin = client_as(&server, "admin1").await;
    let user = client_as(&server, "user1").await;

    let first = admin.create_laptop(sample::new_laptop()).await.unwrap();
    let second = admin.create_laptop(sample::new_laptop()).await.unwrap();

    let responses = user
        .rate_laptop(&[
            (first.clone(), 8.0),
            (second.clone(), 3.0),
            (first.clone(), 7.5),
            (first.clone(), 10.0),
        ])
        .await
        .unwrap();

    let summary: Vec<_> = responses
        .iter()
        .map(|r| (r.laptop_id.as_str(), r.rated_count, r.average_score))
        .collect();
    assert_eq!(
        summary,
        vec![
            (first.as_str(), 1, 8.0),
            (second.as_str(), 1, 3.0),
            (first.as_str(), 2, 7.75),
            (first.as_str(), 3, 8.5),
        ]
    );
}

#[tokio::test]
async fn rating_unknown_laptop_is_not_found() {
    let server = start_test_server().await;
    let client = client_as(&server, "admin1").await;

    let status = client
        .rate_laptop(&[(uuid::Uuid::new_v4().to_string(), 5.0)])
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn reflection_lists_catalog_services() {
    let server = start_test_server().await;
    let mut client = ServerReflectionClient::new(server.channel().await);

    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let mut responses = client
        .server_reflection_info(tokio_stream::iter(vec![request]))
        .await
        .unwrap()
        .into_inner();

    let response = responses.message().await.unwrap().expect("one response");
    let list = match response.message_response {
        Some(MessageResponse::ListServicesResponse(list)) => list,
        other => panic!("unexpected reflection response: {other:?}"),
    };

    let names: Vec<_> = list.service.into_iter().map(|s| s.name).collect();
    assert!(names.contains(&"pcbook.LaptopService".to_string()));
    assert!(names.contains(&"pcbook.AuthService".to_string()));
}
