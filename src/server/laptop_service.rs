use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Claims;
use crate::context::{CallContext, CancelOnDrop};
use crate::proto::laptop_service_server::LaptopService;
use crate::proto::upload_image_request::Data;
use crate::proto::{
    CreateLaptopRequest, CreateLaptopResponse, Filter, RateLaptopRequest, RateLaptopResponse,
    SearchLaptopRequest, SearchLaptopResponse, UploadImageRequest, UploadImageResponse,
};
use crate::store::{DiskImageStore, ImageAssembler, LaptopStore, RatingStore};
use crate::{Error, Result};

/// Buffered responses per search stream.
const SEARCH_STREAM_BUFFER: usize = 16;

/// Buffered responses per bidirectional rating stream.
const RATE_STREAM_BUFFER: usize = 16;

/// gRPC service implementation for the laptop catalog.
#[derive(Clone)]
pub struct LaptopServiceImpl {
    laptops: LaptopStore,
    images: DiskImageStore,
    ratings: RatingStore,
}

impl LaptopServiceImpl {
    /// Creates a catalog service over the given stores.
    pub fn new(laptops: LaptopStore, images: DiskImageStore, ratings: RatingStore) -> Self {
        Self {
            laptops,
            images,
            ratings,
        }
    }

    /// The laptop store backing this service.
    pub fn laptops(&self) -> &LaptopStore {
        &self.laptops
    }

    async fn create(&self, ctx: &CallContext, request: CreateLaptopRequest) -> Result<String> {
        let mut laptop = request
            .laptop
            .ok_or_else(|| Error::InvalidArgument("laptop is missing".to_string()))?;

        if laptop.id.is_empty() {
            laptop.id = Uuid::new_v4().to_string();
        } else {
            Uuid::parse_str(&laptop.id).map_err(|e| {
                Error::InvalidArgument(format!("laptop ID is not a valid UUID: {e}"))
            })?;
        }

        ctx.check()?;

        self.laptops.save(&laptop).await.map_err(|e| match e {
            Error::AlreadyExists(_) => e,
            other => Error::Internal(format!("cannot save laptop to the store: {other}")),
        })?;

        info!(id = %laptop.id, brand = %laptop.brand, "saved laptop");
        Ok(laptop.id)
    }

    async fn receive_image(
        &self,
        ctx: &CallContext,
        stream: &mut Streaming<UploadImageRequest>,
    ) -> Result<UploadImageResponse> {
        let first = stream
            .message()
            .await
            .map_err(|status| Error::Unknown(format!("cannot receive image info: {status}")))?
            .ok_or_else(|| Error::InvalidArgument("image info is missing".to_string()))?;

        let Some(Data::Info(info)) = first.data else {
            return Err(Error::InvalidArgument(
                "first message must carry image info".to_string(),
            ));
        };

        debug!(laptop_id = %info.laptop_id, image_type = %info.image_type, "receiving image");

        if self.laptops.find(&info.laptop_id).await.is_none() {
            return Err(Error::InvalidArgument(format!(
                "laptop '{}' does not exist",
                info.laptop_id
            )));
        }

        let mut assembler = ImageAssembler::new(&info.laptop_id, &info.image_type)?;

        loop {
            ctx.check()?;

            let Some(request) = stream
                .message()
                .await
                .map_err(|status| Error::Unknown(format!("cannot receive chunk data: {status}")))?
            else {
                debug!("no more data");
                break;
            };

            match request.data {
                Some(Data::ChunkData(chunk)) => {
                    assembler.append(&chunk)?;
                    debug!(chunk = chunk.len(), total = assembler.size(), "received chunk");
                }
                Some(Data::Info(_)) => {
                    return Err(Error::InvalidArgument(
                        "image info may only be sent once".to_string(),
                    ));
                }
                None => {
                    return Err(Error::InvalidArgument("chunk data is missing".to_string()));
                }
            }
        }

        let (id, size) = assembler.finish(&self.images).await?;
        counter!("catalog.upload.bytes").increment(u64::from(size));
        info!(%id, size, laptop_id = %info.laptop_id, "saved image");

        Ok(UploadImageResponse { id, size })
    }
}

fn log_failure(call: &str, err: Error) -> Status {
    let status = Status::from(err);
    warn!(call, code = ?status.code(), detail = status.message(), "call failed");
    status
}

fn caller(extensions: &tonic::Extensions) -> String {
    extensions
        .get::<Claims>()
        .map_or_else(|| "anonymous".to_string(), |claims| claims.username.clone())
}

#[tonic::async_trait]
impl LaptopService for LaptopServiceImpl {
    type SearchLaptopStream =
        CancelOnDrop<ReceiverStream<std::result::Result<SearchLaptopResponse, Status>>>;
    type RateLaptopStream =
        CancelOnDrop<ReceiverStream<std::result::Result<RateLaptopResponse, Status>>>;

    async fn create_laptop(
        &self,
        request: Request<CreateLaptopRequest>,
    ) -> std::result::Result<Response<CreateLaptopResponse>, Status> {
        counter!("catalog.create.requests").increment(1);
        let start = Instant::now();

        let ctx = CallContext::from_metadata(request.metadata());
        let caller = caller(request.extensions());
        debug!(%caller, "received create-laptop request");

        let result = self.create(&ctx, request.into_inner()).await;
        histogram!("catalog.create.duration").record(start.elapsed().as_secs_f64());

        match result {
            Ok(id) => {
                counter!("catalog.create.success").increment(1);
                Ok(Response::new(CreateLaptopResponse { id }))
            }
            Err(e) => {
                counter!("catalog.create.failure").increment(1);
                Err(log_failure("CreateLaptop", e))
            }
        }
    }

    async fn search_laptop(
        &self,
        request: Request<SearchLaptopRequest>,
    ) -> std::result::Result<Response<Self::SearchLaptopStream>, Status> {
        counter!("catalog.search.requests").increment(1);

        let ctx = CallContext::from_metadata(request.metadata());
        let filter = request.into_inner().filter.unwrap_or_default();
        debug!(?filter, "received search-laptop request");

        let (tx, rx) = mpsc::channel(SEARCH_STREAM_BUFFER);
        let laptops = self.laptops.clone();
        let task_ctx = ctx.clone();

        tokio::spawn(async move {
            if let Err(e) = search_loop(&task_ctx, &filter, &laptops, &tx).await {
                let _ = tx.send(Err(log_failure("SearchLaptop", e))).await;
            }
        });

        Ok(Response::new(CancelOnDrop::new(ReceiverStream::new(rx), ctx)))
    }

    async fn upload_image(
        &self,
        request: Request<Streaming<UploadImageRequest>>,
    ) -> std::result::Result<Response<UploadImageResponse>, Status> {
        counter!("catalog.upload.requests").increment(1);

        let ctx = CallContext::from_metadata(request.metadata());
        let caller = caller(request.extensions());
        debug!(%caller, "received upload-image request");

        let mut stream = request.into_inner();
        self.receive_image(&ctx, &mut stream)
            .await
            .map(Response::new)
            .map_err(|e| log_failure("UploadImage", e))
    }

    async fn rate_laptop(
        &self,
        request: Request<Streaming<RateLaptopRequest>>,
    ) -> std::result::Result<Response<Self::RateLaptopStream>, Status> {
        let ctx = CallContext::from_metadata(request.metadata());
        let caller = caller(request.extensions());
        debug!(%caller, "received rate-laptop request");

        let mut incoming = request.into_inner();
        let (tx, rx) = mpsc::channel(RATE_STREAM_BUFFER);
        let laptops = self.laptops.clone();
        let ratings = self.ratings.clone();
        let task_ctx = ctx.clone();

        tokio::spawn(async move {
            let result = rate_loop(&task_ctx, &mut incoming, &laptops, &ratings, &tx).await;

            if let Err(e) = result {
                let _ = tx.send(Err(log_failure("RateLaptop", e))).await;
            }
        });

        Ok(Response::new(CancelOnDrop::new(ReceiverStream::new(rx), ctx)))
    }
}

/// Sends every match through the bounded response channel.
///
/// Matches are gathered under the store's read guard and sent after it is
/// released.
async fn search_loop(
    ctx: &CallContext,
    filter: &Filter,
    laptops: &LaptopStore,
    tx: &mpsc::Sender<std::result::Result<SearchLaptopResponse, Status>>,
) -> Result<()> {
    let mut found = Vec::new();
    laptops
        .search(ctx, filter, |laptop| {
            found.push(laptop);
            Ok(())
        })
        .await?;

    let matches = found.len() as u64;
    counter!("catalog.search.matches").increment(matches);

    for laptop in found {
        ctx.check()?;
        debug!(id = %laptop.id, "sending laptop");

        tx.send(Ok(SearchLaptopResponse {
            laptop: Some(laptop),
        }))
        .await
        .map_err(|_| Error::Cancelled)?;
    }

    debug!(matches, "search finished");
    Ok(())
}

async fn rate_loop(
    ctx: &CallContext,
    incoming: &mut Streaming<RateLaptopRequest>,
    laptops: &LaptopStore,
    ratings: &RatingStore,
    tx: &mpsc::Sender<std::result::Result<RateLaptopResponse, Status>>,
) -> Result<()> {
    loop {
        ctx.check()?;

        let Some(request) = incoming
            .message()
            .await
            .map_err(|status| Error::Unknown(format!("cannot receive rating request: {status}")))?
        else {
            debug!("no more data");
            return Ok(());
        };

        counter!("catalog.rate.requests").increment(1);
        debug!(laptop_id = %request.laptop_id, score = request.score, "received rating");

        if laptops.find(&request.laptop_id).await.is_none() {
            return Err(Error::NotFound(format!(
                "laptop '{}' is not found",
                request.laptop_id
            )));
        }

        let rating = ratings.add(&request.laptop_id, request.score).await?;

        let response = RateLaptopResponse {
            laptop_id: request.laptop_id,
            rated_count: rating.count,
            average_score: rating.average(),
        };

        tx.send(Ok(response)).await.map_err(|_| Error::Cancelled)?;
    }
}
