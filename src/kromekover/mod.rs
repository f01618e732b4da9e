//! Stealth script injection
//!
//! Registers a set of evasion scripts with `Page.addScriptToEvaluateOnNewDocument`
//! so they run before any site script on every navigation of the page.

use anyhow::Result;
use chromiumoxide::{Page, cdp};
use futures::future::join_all;
use tracing::{debug, warn};

mod config;
pub use config::Config;

// Order matters: later scripts read `window.__jobhubStealth`.
const EVASION_SCRIPTS: &[(&str, &str)] = &[
    ("navigator_webdriver", NAVIGATOR_WEBDRIVER),
    ("cdp_evasion", CDP_EVASION),
    ("navigator_languages", NAVIGATOR_LANGUAGES),
    ("navigator_plugins", NAVIGATOR_PLUGINS),
    ("hardware_concurrency", HARDWARE_CONCURRENCY),
    ("webgl_vendor", WEBGL_VENDOR),
    ("chrome_runtime", CHROME_RUNTIME),
    ("permissions", PERMISSIONS),
];

const NAVIGATOR_WEBDRIVER: &str = r"
    Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => undefined });
";

const CDP_EVASION: &str = r"
    for (const key of Object.keys(window)) {
        if (/^cdc_|^\$cdc_|^__webdriver|^__selenium|^__driver/.test(key)) {
            try { delete window[key]; } catch (e) {}
        }
    }
";

const NAVIGATOR_LANGUAGES: &str = r"
    Object.defineProperty(Navigator.prototype, 'languages', {
        get: () => window.__jobhubStealth.languages.slice()
    });
    Object.defineProperty(Navigator.prototype, 'platform', {
        get: () => window.__jobhubStealth.platform
    });
";

const NAVIGATOR_PLUGINS: &str = r"
    const mockPlugins = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
        { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
    ];
    const pluginsProto = Object.getPrototypeOf(navigator.plugins);
    Object.defineProperty(Navigator.prototype, 'plugins', {
        get: () => {
            const plugins = {};
            mockPlugins.forEach((plugin, i) => {
                plugins[i] = plugin;
                plugins[plugin.name] = plugin;
            });
            Object.setPrototypeOf(plugins, pluginsProto);
            Object.defineProperty(plugins, 'length', { value: mockPlugins.length });
            return plugins;
        }
    });
";

const HARDWARE_CONCURRENCY: &str = r"
    Object.defineProperty(Navigator.prototype, 'hardwareConcurrency', {
        get: () => window.__jobhubStealth.hardwareConcurrency
    });
    Object.defineProperty(window.screen, 'width', { get: () => window.__jobhubStealth.screenWidth });
    Object.defineProperty(window.screen, 'height', { get: () => window.__jobhubStealth.screenHeight });
";

const WEBGL_VENDOR: &str = r"
    const patchWebGl = (proto) => {
        if (!proto) return;
        const getParameter = proto.getParameter;
        proto.getParameter = new Proxy(getParameter, {
            apply(target, ctx, args) {
                const param = (args && args[0]) || null;
                if (param === 37445) return window.__jobhubStealth.webglVendor;
                if (param === 37446) return window.__jobhubStealth.webglRenderer;
                return Reflect.apply(target, ctx, args);
            }
        });
    };
    patchWebGl(window.WebGLRenderingContext && WebGLRenderingContext.prototype);
    patchWebGl(window.WebGL2RenderingContext && WebGL2RenderingContext.prototype);
";

const CHROME_RUNTIME: &str = r"
    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: () => ({
                onMessage: { addListener: () => {}, removeListener: () => {} },
                postMessage: () => {}
            }),
            sendMessage: () => {}
        };
    }
";

const PERMISSIONS: &str = r"
    if (window.navigator.permissions) {
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) =>
            parameters && parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery(parameters);
    }
";

/// Register every evasion script on `page`.
///
/// Injection is best-effort: individual failures are logged and the call only
/// fails when nothing could be registered. Returns the number of active scripts.
pub async fn inject(page: &Page, config: &Config) -> Result<usize> {
    let stealth_config = format!(
        r#"
        window.__jobhubStealth = {{
            platform: "{}",
            languages: {},
            screenWidth: {},
            screenHeight: {},
            webglVendor: "{}",
            webglRenderer: "{}",
            hardwareConcurrency: {}
        }};
        "#,
        config.platform,
        serde_json::to_string(&config.languages).unwrap_or_else(|_| "[]".to_string()),
        config.screen_width,
        config.screen_height,
        config.webgl_vendor,
        config.webgl_renderer,
        config.hardware_concurrency,
    );

    page.execute(cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
        source: stealth_config,
        include_command_line_api: None,
        world_name: None,
        run_immediately: None,
    })
    .await?;

    let inject_futures: Vec<_> = EVASION_SCRIPTS
        .iter()
        .map(|(name, source)| async move {
            let result = page
                .execute(
                    cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams {
                        source: (*source).to_string(),
                        include_command_line_api: None,
                        world_name: None,
                        run_immediately: None,
                    },
                )
                .await;
            (*name, result)
        })
        .collect();

    let mut success_count = 0;
    let mut failed = Vec::new();
    for (name, result) in join_all(inject_futures).await {
        match result {
            Ok(_) => success_count += 1,
            Err(e) => {
                warn!("Failed to inject {}: {}", name, e);
                failed.push(name);
            }
        }
    }

    if success_count == 0 {
        return Err(anyhow::anyhow!(
            "Failed to inject any stealth scripts ({} failures)",
            failed.len()
        ));
    }

    page.execute(cdp::browser_protocol::network::SetUserAgentOverrideParams {
        user_agent: page_user_agent(page).await?.replace("Headless", ""),
        accept_language: Some(config.accept_language.clone()),
        platform: Some(config.platform.clone()),
        user_agent_metadata: None,
    })
    .await?;

    debug!(
        "Stealth injection complete: {}/{} scripts active",
        success_count,
        EVASION_SCRIPTS.len()
    );
    Ok(success_count)
}

async fn page_user_agent(page: &Page) -> Result<String> {
    let version = page
        .execute(cdp::browser_protocol::browser::GetVersionParams {})
        .await?;
    Ok(version.user_agent.clone())
}
