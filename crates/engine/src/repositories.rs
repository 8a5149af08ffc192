mod download;
mod subscription;

pub use download::DownloadRepository;
pub use subscription::SubscriptionRepository;
