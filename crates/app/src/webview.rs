//! WebView2 hosting for the overlay window.
//!
//! The renderer is an external collaborator; this module is the whole of
//! its surface as far as the rest of the workspace is concerned. Messages
//! it emits are handed to [`overlay::post_renderer_message`], and the
//! [`RendererBridge`] impl carries data the other way.

use anyhow::{anyhow, Context, Result};
use overlay::{post_renderer_message, RendererBridge, TRANS_COLOR_RGB};
use std::sync::mpsc;
use tracing::warn;
use webview2_com::Microsoft::Web::WebView2::Win32::{
    CreateCoreWebView2EnvironmentWithOptions, ICoreWebView2, ICoreWebView2Controller,
    ICoreWebView2Controller2, ICoreWebView2Environment, ICoreWebView2EnvironmentOptions,
    COREWEBVIEW2_COLOR,
};
use webview2_com::{
    take_pwstr, wait_with_pump, AddScriptToExecuteOnDocumentCreatedCompletedHandler,
    CoreWebView2EnvironmentOptions, CreateCoreWebView2ControllerCompletedHandler,
    CreateCoreWebView2EnvironmentCompletedHandler, WebMessageReceivedEventHandler,
};
use windows::core::{Error as WinError, Interface, HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::{E_POINTER, HWND, RECT};
use windows::Win32::System::WinRT::EventRegistrationToken;
use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

const BROWSER_ARGUMENTS: &str =
    "--disable-web-security --allow-file-access-from-files --allow-universal-access-from-files";

/// Handle pair for the embedded browser. Cloneable so the window state and
/// the startup path can both drive it; all calls stay on the UI thread.
#[derive(Clone)]
pub struct WebViewBridge {
    controller: ICoreWebView2Controller,
    webview: ICoreWebView2,
}

impl WebViewBridge {
    /// Create the WebView2 environment and controller inside `hwnd`,
    /// pumping messages until the async creation completes.
    pub fn create(hwnd: HWND) -> Result<Self> {
        // The UI is a local file; without these the page cannot message us.
        std::env::set_var("WEBVIEW2_ADDITIONAL_BROWSER_ARGUMENTS", BROWSER_ARGUMENTS);

        let environment = create_environment()?;
        let controller = create_controller(&environment, hwnd)?;
        let webview = unsafe { controller.CoreWebView2() }
            .context("controller carries no webview")?;

        unsafe {
            let settings = webview.Settings()?;
            settings.SetAreHostObjectsAllowed(true)?;

            let mut bounds = RECT::default();
            let _ = GetClientRect(hwnd, &mut bounds);
            controller.SetBounds(RECT {
                left: 0,
                top: 0,
                right: bounds.right,
                bottom: bounds.bottom,
            })?;

            let (r, g, b) = TRANS_COLOR_RGB;
            let controller2: ICoreWebView2Controller2 = controller.cast()?;
            controller2.SetDefaultBackgroundColor(COREWEBVIEW2_COLOR { A: 0, R: r, G: g, B: b })?;
        }

        install_background_script(&webview)?;
        install_message_handler(&webview, hwnd)?;

        Ok(Self { controller, webview })
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        unsafe {
            self.webview.Navigate(&HSTRING::from(url))?;
        }
        Ok(())
    }
}

impl RendererBridge for WebViewBridge {
    fn post_message(&self, text: &str) {
        unsafe {
            if let Err(e) = self.webview.PostWebMessageAsString(&HSTRING::from(text)) {
                warn!("dropping web message: {e}");
            }
        }
    }

    fn resize(&self, width: i32, height: i32) {
        unsafe {
            let _ = self.controller.SetBounds(RECT {
                left: 0,
                top: 0,
                right: width,
                bottom: height,
            });
        }
    }
}

fn create_environment() -> Result<ICoreWebView2Environment> {
    let (tx, rx) = mpsc::channel::<Result<ICoreWebView2Environment, WinError>>();
    let options = CoreWebView2EnvironmentOptions::default();

    unsafe {
        let handler = CreateCoreWebView2EnvironmentCompletedHandler::create(Box::new(
            move |result, environment| {
                let outcome = match result {
                    Ok(()) => environment.ok_or_else(|| WinError::from(E_POINTER)),
                    Err(err) => Err(err),
                };
                let _ = tx.send(outcome);
                Ok(())
            },
        ));

        CreateCoreWebView2EnvironmentWithOptions(
            PCWSTR::null(),
            PCWSTR::null(),
            &ICoreWebView2EnvironmentOptions::from(options),
            &handler,
        )?;
    }

    match wait_with_pump(rx) {
        Ok(result) => result.context("WebView2 environment creation failed"),
        Err(e) => Err(anyhow!("message pump failed while creating the environment: {e:?}")),
    }
}

fn create_controller(
    environment: &ICoreWebView2Environment,
    hwnd: HWND,
) -> Result<ICoreWebView2Controller> {
    let (tx, rx) = mpsc::channel::<Result<ICoreWebView2Controller, WinError>>();

    unsafe {
        let handler = CreateCoreWebView2ControllerCompletedHandler::create(Box::new(
            move |result, controller| {
                let outcome = match result {
                    Ok(()) => controller.ok_or_else(|| WinError::from(E_POINTER)),
                    Err(err) => Err(err),
                };
                let _ = tx.send(outcome);
                Ok(())
            },
        ));

        environment.CreateCoreWebView2Controller(hwnd, &handler)?;
    }

    match wait_with_pump(rx) {
        Ok(result) => result.context("WebView2 controller creation failed"),
        Err(e) => Err(anyhow!("message pump failed while creating the controller: {e:?}")),
    }
}

/// Paint the document body with the keyed color so the page is see-through
/// wherever it draws nothing opaque.
fn install_background_script(webview: &ICoreWebView2) -> Result<()> {
    let (r, g, b) = TRANS_COLOR_RGB;
    let script = format!("document.body.style.background = 'rgba({r},{g},{b},0)'");

    let handler = AddScriptToExecuteOnDocumentCreatedCompletedHandler::create(Box::new(
        |error_code, _id| {
            error_code?;
            Ok(())
        },
    ));
    unsafe {
        webview.AddScriptToExecuteOnDocumentCreated(&HSTRING::from(script), &handler)?;
    }
    Ok(())
}

fn install_message_handler(webview: &ICoreWebView2, hwnd: HWND) -> Result<()> {
    let mut token = EventRegistrationToken::default();
    let handler = WebMessageReceivedEventHandler::create(Box::new(move |_sender, args| {
        if let Some(args) = args {
            let mut raw = PWSTR::null();
            if unsafe { args.TryGetWebMessageAsString(&mut raw) }.is_ok() {
                post_renderer_message(hwnd, take_pwstr(raw));
            }
        }
        Ok(())
    }));

    unsafe {
        webview.add_WebMessageReceived(&handler, &mut token)?;
    }
    Ok(())
}
