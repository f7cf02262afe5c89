//! Generates the `recipes.RecipeService` client and server stubs.
//!
//! The messages are plain `prost` derives in `src/rpc/proto.rs`, so the
//! service is described here directly instead of through a `.proto` file and
//! no protobuf compiler is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::proto::{input}"))
        .output_type(format!("crate::rpc::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let service = Service::builder()
        .name("RecipeService")
        .package("recipes")
        .method(unary("add_recipe", "AddRecipe", "Recipe", "Empty"))
        .method(unary("get_recipe", "GetRecipe", "RecipeRequest", "Recipe"))
        .method(unary("find_recipes", "FindRecipes", "FindRequest", "Recipes"))
        .build();

    Builder::new().compile(&[service]);
    println!("cargo:rerun-if-changed=build.rs");
}
