use std::time::Duration;

use tonic::codegen::InterceptedService;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::{debug, info};

use super::interceptor::ClientAuthInterceptor;
use crate::proto::laptop_service_client::LaptopServiceClient;
use crate::proto::upload_image_request::Data;
use crate::proto::{
    CreateLaptopRequest, Filter, ImageInfo, Laptop, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, UploadImageRequest, UploadImageResponse,
};

/// Bytes carried by each upload chunk.
pub const CHUNK_SIZE: usize = 1024;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Catalog client whose calls carry access tokens where required.
#[derive(Clone)]
pub struct LaptopClient {
    service: LaptopServiceClient<InterceptedService<Channel, ClientAuthInterceptor>>,
}

impl LaptopClient {
    /// Creates a client over `channel`, authenticating through `interceptor`.
    pub fn new(channel: Channel, interceptor: ClientAuthInterceptor) -> Self {
        Self {
            service: LaptopServiceClient::with_interceptor(channel, interceptor),
        }
    }

    /// Creates `laptop` and returns the id the server stored it under.
    pub async fn create_laptop(&self, laptop: Laptop) -> Result<String, Status> {
        let mut request = Request::new(CreateLaptopRequest {
            laptop: Some(laptop),
        });
        request.set_timeout(CALL_TIMEOUT);

        let id = self
            .service
            .clone()
            .create_laptop(request)
            .await?
            .into_inner()
            .id;
        info!(%id, "created laptop");

        Ok(id)
    }

    /// Collects every laptop matching `filter`.
    pub async fn search_laptop(&self, filter: Filter) -> Result<Vec<Laptop>, Status> {
        let mut request = Request::new(SearchLaptopRequest {
            filter: Some(filter),
        });
        request.set_timeout(CALL_TIMEOUT);

        let mut stream = self.service.clone().search_laptop(request).await?.into_inner();
        let mut laptops = Vec::new();

        while let Some(response) = stream.message().await? {
            if let Some(laptop) = response.laptop {
                debug!(id = %laptop.id, price = laptop.price_usd, "found laptop");
                laptops.push(laptop);
            }
        }

        Ok(laptops)
    }

    /// Uploads `data` as an image of `laptop_id` in [`CHUNK_SIZE`] pieces.
    pub async fn upload_image(
        &self,
        laptop_id: &str,
        image_type: &str,
        data: &[u8],
    ) -> Result<UploadImageResponse, Status> {
        let info = UploadImageRequest {
            data: Some(Data::Info(ImageInfo {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
            })),
        };
        let chunks = data.chunks(CHUNK_SIZE).map(|chunk| UploadImageRequest {
            data: Some(Data::ChunkData(chunk.to_vec())),
        });
        let messages: Vec<_> = std::iter::once(info).chain(chunks).collect();

        let mut request = Request::new(tokio_stream::iter(messages));
        request.set_timeout(CALL_TIMEOUT);

        let response = self.service.clone().upload_image(request).await?.into_inner();
        info!(id = %response.id, size = response.size, "uploaded image");

        Ok(response)
    }

    /// Rates each laptop in `ratings` and returns the updated aggregates in
    /// request order.
    pub async fn rate_laptop(
        &self,
        ratings: &[(String, f64)],
    ) -> Result<Vec<RateLaptopResponse>, Status> {
        let requests: Vec<_> = ratings
            .iter()
            .map(|(laptop_id, score)| RateLaptopRequest {
                laptop_id: laptop_id.clone(),
                score: *score,
            })
            .collect();

        let mut request = Request::new(tokio_stream::iter(requests));
        request.set_timeout(CALL_TIMEOUT);

        let mut stream = self.service.clone().rate_laptop(request).await?.into_inner();
        let mut responses = Vec::with_capacity(ratings.len());

        while let Some(response) = stream.message().await? {
            debug!(
                laptop_id = %response.laptop_id,
                count = response.rated_count,
                average = response.average_score,
                "received rating"
            );
            responses.push(response);
        }

        Ok(responses)
    }
}
