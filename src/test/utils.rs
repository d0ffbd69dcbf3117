#[cfg(test)]
pub mod test_db {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Once;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};

    use crate::db::{create_category, create_location, create_project, create_user, migrate};
    use crate::error::AppError;
    use crate::models::{Doer, NewLocation, ProjectInput, ProjectStatus};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// A private in-memory database. One connection keeps it alive for the
    /// lifetime of the pool.
    pub async fn test_pool() -> Result<Pool<Sqlite>, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        migrate(&pool).await?;
        Ok(pool)
    }

    pub struct TestLocation {
        pub owner: String,
        pub id: String,
        pub name: String,
    }

    pub struct TestCategory {
        pub owner: String,
        pub location_id: String,
        pub name: String,
    }

    pub struct TestProject {
        pub owner: String,
        pub input: ProjectInput,
    }

    impl TestProject {
        pub fn new(owner: &str, name: &str) -> Self {
            Self {
                owner: owner.to_string(),
                input: ProjectInput::named(name),
            }
        }

        pub fn location(mut self, location: &str) -> Self {
            self.input.location = Some(location.to_string());
            self
        }

        pub fn category(mut self, category: &str) -> Self {
            self.input.category = Some(category.to_string());
            self
        }

        pub fn description(mut self, description: &str) -> Self {
            self.input.description = Some(description.to_string());
            self
        }

        pub fn status(mut self, status: ProjectStatus) -> Self {
            self.input.status = status;
            self
        }

        pub fn doer(mut self, doer: Doer) -> Self {
            self.input.doer = doer;
            self
        }

        pub fn budget(mut self, budget: f64) -> Self {
            self.input.budget = Some(budget);
            self
        }

        pub fn actual_cost(mut self, actual_cost: f64) -> Self {
            self.input.actual_cost = Some(actual_cost);
            self
        }

        pub fn estimated_days(mut self, days: i64) -> Self {
            self.input.estimated_days = Some(days);
            self
        }
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<String>,
        locations: Vec<TestLocation>,
        categories: Vec<TestCategory>,
        projects: Vec<TestProject>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(username.to_string());
            self
        }

        pub fn location(mut self, owner: &str, id: &str, name: &str) -> Self {
            self.locations.push(TestLocation {
                owner: owner.to_string(),
                id: id.to_string(),
                name: name.to_string(),
            });
            self
        }

        pub fn category(mut self, owner: &str, location_id: &str, name: &str) -> Self {
            self.categories.push(TestCategory {
                owner: owner.to_string(),
                location_id: location_id.to_string(),
                name: name.to_string(),
            });
            self
        }

        pub fn project(mut self, project: TestProject) -> Self {
            self.projects.push(project);
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            init_test_logging();

            let pool = test_pool().await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut category_id_map: HashMap<(String, String, String), i64> = HashMap::new();
            let mut project_id_map: HashMap<String, i64> = HashMap::new();

            for username in &self.users {
                let user = create_user(&pool, username, STANDARD_PASSWORD, None).await?;
                user_id_map.insert(username.clone(), user.id);
            }

            let owner_id = |owner: &str| {
                user_id_map
                    .get(owner)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(format!("test user {}", owner)))
            };

            for location in &self.locations {
                create_location(
                    &pool,
                    owner_id(&location.owner)?,
                    &NewLocation {
                        id: location.id.clone(),
                        name: location.name.clone(),
                        ..Default::default()
                    },
                )
                .await?;
            }

            for category in &self.categories {
                let created = create_category(
                    &pool,
                    owner_id(&category.owner)?,
                    &category.location_id,
                    &category.name,
                )
                .await?;
                category_id_map.insert(
                    (
                        category.owner.clone(),
                        category.location_id.clone(),
                        category.name.clone(),
                    ),
                    created.id,
                );
            }

            for project in &self.projects {
                let created = create_project(&pool, owner_id(&project.owner)?, &project.input).await?;
                project_id_map.insert(project.input.name.clone(), created.id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                category_id_map,
                project_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub category_id_map: HashMap<(String, String, String), i64>,
        pub project_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn category_id(&self, owner: &str, location_id: &str, name: &str) -> i64 {
            self.category_id_map[&(owner.to_string(), location_id.to_string(), name.to_string())]
        }

        pub fn project_id(&self, name: &str) -> i64 {
            self.project_id_map[name]
        }

        pub async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .unwrap()
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder, TestProject};
    use crate::build_rocket;
    use crate::env::AppConfig;
    use crate::models::ProjectStatus;

    pub const BOUNDARY: &str = "renovation-tracker-test-boundary";

    /// Two users; `alice` owns a kitchen with one finished and one planned
    /// project and an empty garage. `bob` owns a boat.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .location("alice", "kitchen", "Kitchen")
            .location("alice", "garage", "Garage")
            .location("bob", "boat", "Boat")
            .category("alice", "kitchen", "Tiles")
            .category("alice", "kitchen", "Plumbing")
            .category("bob", "boat", "Engine")
            .project(
                TestProject::new("alice", "Backsplash")
                    .location("kitchen")
                    .category("Tiles")
                    .status(ProjectStatus::Completed)
                    .budget(500.0)
                    .actual_cost(480.0)
                    .estimated_days(3),
            )
            .project(
                TestProject::new("alice", "New sink")
                    .location("kitchen")
                    .category("Plumbing")
                    .budget(1200.0)
                    .estimated_days(10),
            )
            .project(
                TestProject::new("bob", "Engine service")
                    .location("boat")
                    .category("Engine")
                    .status(ProjectStatus::InProgress)
                    .budget(900.0),
            )
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            upload_dir: std::env::temp_dir()
                .join(format!("renovation-tracker-test-{}", Uuid::new_v4())),
            max_upload_mib: 1,
            ..AppConfig::default()
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = build_rocket(test_db.pool.clone(), test_config())
            .await
            .expect("Failed to build rocket");
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, test_db)
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub async fn login_test_user(client: &Client, username: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": STANDARD_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);
        let body: Value = response.into_json().await.expect("login body");
        body["token"].as_str().expect("token").to_string()
    }

    pub fn multipart_content_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// Builds a multipart body with text fields and at most one file field.
    pub fn multipart_body(
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &str, &[u8])>,
    ) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }

        if let Some((field, filename, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}
