use eframe::egui;
use platform_explorer::app::ExplorerApp;
use platform_explorer::config::AppConfig;
use platform_explorer::platform::Platform;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("platform_explorer=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = AppConfig::load()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("explorer-runtime")
        .build()?;

    let platform = Platform::from_config(&config)?;
    let models = platform_explorer::build_view_models(&config, platform)?;
    let handle = runtime.handle().clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([720.0, 560.0])
            .with_title("Platform Explorer"),
        ..Default::default()
    };

    info!("opening window");
    eframe::run_native(
        "Platform Explorer",
        native_options,
        Box::new(move |creation_context| {
            Ok(Box::new(ExplorerApp::new(
                handle,
                models,
                &creation_context.egui_ctx,
            )))
        }),
    )?;

    drop(runtime);
    Ok(())
}
