use log::{error, info};
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use crate::comment::model::Comment;
use crate::comment::service::COMMENTS_COLLECTION;
use crate::config::DatabaseConfig;
use crate::post::post_model::Post;
use crate::post::post_service::POSTS_COLLECTION;
use crate::user::model::User;
use crate::user::service::USERS_COLLECTION;

pub async fn init(config: &DatabaseConfig) -> Result<Database, mongodb::error::Error> {
    let mut client_options = ClientOptions::parse(&config.uri).await?;
    client_options.app_name = Some("blog_api".to_string());

    let client = Client::with_options(client_options)?;

    // Ping the server to see if you can connect to the cluster
    client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await?;

    info!("Connected successfully to MongoDB ({})", config.name);

    let db = client.database(&config.name);
    ensure_indexes(&db).await?;
    Ok(db)
}

async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = || IndexOptions::builder().unique(true).build();

    let users = db.collection::<User>(USERS_COLLECTION);
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    let posts = db.collection::<Post>(POSTS_COLLECTION);
    posts
        .create_index(IndexModel::builder().keys(doc! { "author": 1, "_id": -1 }).build())
        .await?;
    posts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    posts
        .create_index(IndexModel::builder().keys(doc! { "tags": 1 }).build())
        .await?;

    let comments = db.collection::<Comment>(COMMENTS_COLLECTION);
    comments
        .create_index(IndexModel::builder().keys(doc! { "post": 1, "parent": 1 }).build())
        .await?;
    comments
        .create_index(IndexModel::builder().keys(doc! { "author": 1 }).build())
        .await?;

    Ok(())
}

// This function is a convenience wrapper around init()
pub async fn connect_to_mongo(config: &DatabaseConfig) -> Result<Database, mongodb::error::Error> {
    init(config).await.map_err(|e| {
        error!("Failed to initialize database: {:?}", e);
        e
    })
}
