use crate::routes::{ai, banners, catalog, health, images, interactions, system_configs, users};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "galleria-server",
    description = "galleria wallpaper gallery API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(images::ImagesApi::openapi());
    root.merge(catalog::CatalogApi::openapi());
    root.merge(banners::BannersApi::openapi());
    root.merge(users::UsersApi::openapi());
    root.merge(interactions::InteractionsApi::openapi());
    root.merge(system_configs::SystemConfigsApi::openapi());
    root.merge(ai::AiApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_every_route_group() {
        let doc = get_docs();
        for path in [
            "/health",
            "/images/{id}",
            "/topics/{id}/images",
            "/banners",
            "/users",
            "/interactions/favorite",
            "/system-configs/{key}",
            "/ai/generate",
            "/ai/tasks/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
