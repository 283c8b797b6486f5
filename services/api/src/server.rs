use crate::cli::ServeArgs;
use crate::infra::{build_form_service, template_source, AppState, ServiceLayout};
use crate::routes::with_form_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use form_filler::config::AppConfig;
use form_filler::error::AppError;
use form_filler::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let forms = &config.forms;
    let (form_service, _) = build_form_service(ServiceLayout {
        template_dir: forms.template_dir.clone(),
        template_name: forms.template_name.clone(),
        storage_root: forms.storage_root.clone(),
        output_dir: forms.output_dir.clone(),
        cache_templates: forms.cache_templates,
    });
    let pages = template_source(forms.pages_dir.clone(), forms.cache_templates);

    let app = with_form_routes(Arc::new(form_service), pages)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        template_dir = %forms.template_dir.display(),
        storage_root = %forms.storage_root.display(),
        "form 1040 service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
