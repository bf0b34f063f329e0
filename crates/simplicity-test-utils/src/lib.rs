pub mod assertions;
pub mod images;
pub mod multipart;
pub mod server;

pub use assertions::{assert_api_error, assert_ok};
pub use images::{sample_jpeg, sample_png};
pub use multipart::MultipartBody;
pub use server::{
    TestResponse, create_test_app_state, create_test_app_state_with_config, create_test_config, create_test_router,
    create_test_router_and_store, send_raw, send_request, upload_file,
};
