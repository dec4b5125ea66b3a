//! Bindings to the shell's private virtual desktop service.
//!
//! The shell exposes virtual desktops through undocumented COM interfaces
//! hosted by `explorer.exe`.  Their identities and vtable layouts change
//! between Windows builds, so each supported contract gets its own module
//! ([`win10`], [`win11`]) and [`Backend`] dispatches to the one picked by
//! [`BackendVariant::for_version`](crate::version::BackendVariant::for_version).
//!
//! Everything here belongs to the executor's worker thread: the apartment is
//! entered in [`ShellDesktops::connect`] and left when it is dropped.

pub mod win10;
pub mod win11;

use crate::traits::{DesktopChangedHandler, DesktopService, ServiceError};
use crate::version::BackendVariant;
use log::{debug, warn};
use std::ffi::c_void;
use std::sync::{Arc, Mutex, PoisonError};
use windows::core::{interface, IUnknown, IUnknown_Vtbl, Interface, GUID, HRESULT, PCWSTR};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, IServiceProvider, CLSCTX_LOCAL_SERVER,
    COINIT_APARTMENTTHREADED,
};
use windows::Win32::UI::Shell::Common::IObjectArray;
use windows::Win32::UI::Shell::{IVirtualDesktopManager, VirtualDesktopManager};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, EnumWindows, GetAncestor, GetForegroundWindow, GetWindowThreadProcessId,
    IsWindowVisible, PeekMessageW, TranslateMessage, GA_ROOTOWNER, MSG, PM_REMOVE,
};

const CLSID_IMMERSIVE_SHELL: GUID = GUID::from_u128(0xC2F03A33_21F5_47FA_B4BB_156362A2F239);
pub(crate) const CLSID_VIRTUAL_DESKTOP_MANAGER_INTERNAL: GUID =
    GUID::from_u128(0xC5E0CDCA_7B6E_41B2_9FC4_D93975CC467B);
const CLSID_VIRTUAL_DESKTOP_NOTIFICATION_SERVICE: GUID =
    GUID::from_u128(0xA501FDEC_4A09_464C_AE4E_1B9C21B84918);

//  Interfaces shared by every contract

#[interface("372E1D3B-38D3-42E4-A15B-8AB2B178F513")]
pub unsafe trait IApplicationView: IUnknown {}

#[interface("1841C6D7-4F9D-42C0-AF41-8747538F10E5")]
pub unsafe trait IApplicationViewCollection: IUnknown {
    fn GetViews(&self, array: *mut Option<IObjectArray>) -> HRESULT;
    fn GetViewsByZOrder(&self, array: *mut Option<IObjectArray>) -> HRESULT;
    fn GetViewsByAppUserModelId(
        &self,
        id: PCWSTR,
        array: *mut Option<IObjectArray>,
    ) -> HRESULT;
    fn GetViewForHwnd(&self, hwnd: HWND, view: *mut Option<IApplicationView>) -> HRESULT;
}

#[interface("0CD45E71-D927-4F15-8B0A-8FEF525337BF")]
pub unsafe trait IVirtualDesktopNotificationService: IUnknown {
    fn Register(&self, notification: *mut c_void, cookie: *mut u32) -> HRESULT;
    fn Unregister(&self, cookie: u32) -> HRESULT;
}

/// Slot for the desktop-changed handler, shared with the notification sink.
pub(crate) type HandlerSlot = Arc<Mutex<Option<DesktopChangedHandler>>>;

pub(crate) fn fire(slot: &HandlerSlot, index: usize) {
    let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handler) = guard.as_ref() {
        handler(index);
    }
}

/// Wrap a COM failure with the name of the call that produced it.
pub(crate) fn com_err(call: &'static str) -> impl Fn(windows::core::Error) -> ServiceError {
    move |e| ServiceError::new(format!("{} failed: {}", call, e))
}

/// Turn a filled-in out parameter into a value, treating null as failure.
pub(crate) fn required<T>(value: Option<T>, call: &'static str) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::new(format!("{} returned null", call)))
}

/// A desktop object of one contract.
pub(crate) trait VirtualDesktop: Interface + Clone {
    fn id(&self) -> Result<GUID, ServiceError>;
}

/// Unpack the desktop array returned by `GetDesktops`.
pub(crate) fn desktops_in<D: VirtualDesktop>(array: &IObjectArray) -> Result<Vec<D>, ServiceError> {
    let count = unsafe { array.GetCount() }.map_err(com_err("IObjectArray::GetCount"))?;
    (0..count)
        .map(|i| unsafe { array.GetAt::<D>(i) }.map_err(com_err("IObjectArray::GetAt")))
        .collect()
}

/// Position of `target` among `all`, matched by desktop id.
pub(crate) fn index_of<D: VirtualDesktop>(all: &[D], target: &D) -> Result<usize, ServiceError> {
    let id = target.id()?;
    for (i, desktop) in all.iter().enumerate() {
        if desktop.id()? == id {
            return Ok(i);
        }
    }
    Err(ServiceError::new("desktop not found in the desktop list"))
}

//  Shell connection

/// Service handles that do not depend on the contract version.
pub(crate) struct Shell {
    pub provider: IServiceProvider,
    pub views: IApplicationViewCollection,
    pub notifications: IVirtualDesktopNotificationService,
    pub public: IVirtualDesktopManager,
}

impl Shell {
    fn connect() -> Result<Self, ServiceError> {
        let provider: IServiceProvider =
            unsafe { CoCreateInstance(&CLSID_IMMERSIVE_SHELL, None, CLSCTX_LOCAL_SERVER) }
                .map_err(com_err("CoCreateInstance(ImmersiveShell)"))?;
        let views = unsafe {
            provider.QueryService::<IApplicationViewCollection>(&IApplicationViewCollection::IID)
        }
        .map_err(com_err("QueryService(IApplicationViewCollection)"))?;
        let notifications = unsafe {
            provider.QueryService::<IVirtualDesktopNotificationService>(
                &CLSID_VIRTUAL_DESKTOP_NOTIFICATION_SERVICE,
            )
        }
        .map_err(com_err("QueryService(IVirtualDesktopNotificationService)"))?;
        let public: IVirtualDesktopManager =
            unsafe { CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_LOCAL_SERVER) }
                .map_err(com_err("CoCreateInstance(VirtualDesktopManager)"))?;
        Ok(Self {
            provider,
            views,
            notifications,
            public,
        })
    }

    fn view_for(&self, hwnd: HWND) -> Result<IApplicationView, ServiceError> {
        let mut view = None;
        unsafe { self.views.GetViewForHwnd(hwnd, &mut view) }
            .ok()
            .map_err(com_err("GetViewForHwnd"))?;
        required(view, "GetViewForHwnd")
    }

    /// Register a notification sink, returning its cookie.
    pub fn register(&self, sink: *mut c_void) -> Result<u32, ServiceError> {
        let mut cookie = 0u32;
        unsafe { self.notifications.Register(sink, &mut cookie) }
            .ok()
            .map_err(com_err("IVirtualDesktopNotificationService::Register"))?;
        Ok(cookie)
    }

    pub fn unregister(&self, cookie: u32) {
        if let Err(e) = unsafe { self.notifications.Unregister(cookie) }.ok() {
            warn!("failed to unregister desktop notifications: {}", e);
        }
    }

    /// Move the foreground window to the desktop `desktop_id`.
    ///
    /// Our own windows go through the public manager first.  Windows of
    /// other processes are moved by view, retrying with the owning
    /// process's main window when the foreground window has no view of its
    /// own (dialogs, tool windows).
    pub fn move_foreground_window(
        &self,
        desktop_id: GUID,
        move_view: impl Fn(&IApplicationView) -> windows::core::Result<()>,
    ) -> Result<(), ServiceError> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return Err(ServiceError::new("there is no foreground window"));
        }
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };

        if pid == std::process::id() {
            if unsafe { self.public.MoveWindowToDesktop(hwnd, &desktop_id) }.is_ok() {
                return Ok(());
            }
            let view = self.view_for(hwnd)?;
            return move_view(&view).map_err(com_err("MoveViewToDesktop"));
        }

        let first = self
            .view_for(hwnd)
            .and_then(|view| move_view(&view).map_err(com_err("MoveViewToDesktop")));
        match first {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("{}, retrying with the main window of process {}", e, pid);
                let main = main_window_of(pid)
                    .ok_or_else(|| ServiceError::new(format!("process {} has no main window", pid)))?;
                let view = self.view_for(main)?;
                move_view(&view).map_err(com_err("MoveViewToDesktop"))
            }
        }
    }
}

struct MainWindowSearch {
    pid: u32,
    found: Option<HWND>,
}

unsafe extern "system" fn find_main_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam.0 as *mut MainWindowSearch);
    let mut pid = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));
    if pid == search.pid && IsWindowVisible(hwnd).as_bool() && GetAncestor(hwnd, GA_ROOTOWNER) == hwnd
    {
        search.found = Some(hwnd);
        return BOOL(0);
    }
    BOOL(1)
}

/// First visible, unowned top-level window of `pid`.
fn main_window_of(pid: u32) -> Option<HWND> {
    let mut search = MainWindowSearch { pid, found: None };
    unsafe {
        // Stopping early reports an error; the result is in `search`.
        let _ = EnumWindows(
            Some(find_main_window),
            LPARAM(&mut search as *mut MainWindowSearch as isize),
        );
    }
    search.found
}

/// Dispatch whatever is waiting in this thread's message queue.  Incoming
/// COM calls to an apartment-threaded sink arrive this way.
fn pump_messages() {
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

//  Backend dispatch

/// One variant per supported COM contract.
pub enum Backend {
    Windows10(win10::Service),
    Windows11(win11::Service),
}

/// Leaves the COM apartment on drop.
struct Apartment;

impl Apartment {
    fn enter() -> Result<Self, ServiceError> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(com_err("CoInitializeEx"))?;
        Ok(Apartment)
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

/// The [`DesktopService`] backed by the shell.
///
/// Field order matters: the backend releases its interfaces before the
/// apartment is left.
pub struct ShellDesktops {
    backend: Backend,
    handler: HandlerSlot,
    _apartment: Apartment,
}

impl ShellDesktops {
    /// Enter a single-threaded apartment on the calling thread and bind to
    /// the service using the `variant` contract.
    pub fn connect(variant: BackendVariant) -> Result<Self, ServiceError> {
        let apartment = Apartment::enter()?;
        let shell = Shell::connect()?;
        let handler: HandlerSlot = Arc::default();
        let backend = match variant {
            BackendVariant::Windows10_17763 => {
                Backend::Windows10(win10::Service::connect(shell, Arc::clone(&handler))?)
            }
            BackendVariant::Windows11_22631_3085 => {
                Backend::Windows11(win11::Service::connect(shell, Arc::clone(&handler))?)
            }
        };
        debug!("connected to the virtual desktop service ({})", variant);
        Ok(Self {
            backend,
            handler,
            _apartment: apartment,
        })
    }
}

impl DesktopService for ShellDesktops {
    fn current_desktop(&mut self) -> Result<usize, ServiceError> {
        match &self.backend {
            Backend::Windows10(s) => s.current_desktop(),
            Backend::Windows11(s) => s.current_desktop(),
        }
    }

    fn desktop_count(&mut self) -> Result<usize, ServiceError> {
        match &self.backend {
            Backend::Windows10(s) => s.desktop_count(),
            Backend::Windows11(s) => s.desktop_count(),
        }
    }

    fn jump_to(&mut self, index: usize) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::Windows10(s) => s.jump_to(index),
            Backend::Windows11(s) => s.jump_to(index),
        }
    }

    fn move_focused_window_to(&mut self, index: usize) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::Windows10(s) => s.move_focused_window_to(index),
            Backend::Windows11(s) => s.move_focused_window_to(index),
        }
    }

    fn create_desktop(&mut self) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::Windows10(s) => s.create_desktop(),
            Backend::Windows11(s) => s.create_desktop(),
        }
    }

    fn subscribe(&mut self, handler: DesktopChangedHandler) -> Result<(), ServiceError> {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        Ok(())
    }

    fn pump(&mut self) {
        pump_messages();
    }
}
