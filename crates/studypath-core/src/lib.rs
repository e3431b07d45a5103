pub mod config;
pub mod generator;
pub mod llm;
pub mod logging;
pub mod manager;
pub mod navigation;
pub mod progress;
pub mod resources;
pub mod roadmap;
pub mod storage;

pub use config::Config;
pub use generator::{GenerationError, LlmRoadmapGenerator, RoadmapGenerator};
pub use manager::{ManagerError, RoadmapManager};
pub use navigation::{Cursor, CursorState, LearningSession};
pub use progress::{CompletedResources, ProgressStats};
pub use resources::{MixedResourceFetcher, ResourceFetcher, ResourceQuery};
pub use roadmap::{Edge, Position, Resource, ResourceType, Roadmap, RoadmapMetadata, TopicNode};
pub use storage::{FileStore, KeyValueStore, MemoryStore, RoadmapRepository};
